//! Diagnostic output
//!
//! Only installed when `LIBDD_DEBUG=1`. Lines go to stderr, each tagged with
//! the component name and the pid of the host process:
//!
//! ```text
//! libdenydevice/4711: Denying access to '/dev/input/event3'
//! ```
//!
//! The library links its own copy of `tracing`, so a Rust host's subscriber
//! never sees these events and vice versa.

use std::fmt;

use nix::unistd::getpid;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Tag at the start of every diagnostic line
pub const COMPONENT: &str = "libdenydevice";

/// `<component>/<pid>: <message>`
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentPrefix;

impl<S, N> FormatEvent<S, N> for ComponentPrefix
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        // pid read per line: the host may fork after initialization
        write!(writer, "{}/{}: ", COMPONENT, getpid())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the stderr subscriber. A host that already set a global
/// dispatcher inside this library's copy of `tracing` keeps it.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .event_format(ComponentPrefix)
        .try_init();
}

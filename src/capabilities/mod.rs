mod telemetry;
mod timer;

pub use self::telemetry::{Telemetry, TelemetryOperation};
pub use self::timer::{Timer, TimerId, TimerOperation, TimerOutput};

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::event::Event;

pub type AppHttp = Http<Event>;
pub type AppKv = KeyValue<Event>;
pub type AppRender = Render<Event>;
pub type AppTimer = Timer<Event>;
pub type AppTelemetry = Telemetry<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    // The Effect derive needs the event type parameter written out; the
    // App* aliases above are the same types.
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub render: Render<Event>,
    pub timer: Timer<Event>,
    pub telemetry: Telemetry<Event>,
}

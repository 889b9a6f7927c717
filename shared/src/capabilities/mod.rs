mod alert;
mod images;

pub use self::alert::{Alert, AlertOperation};
pub use self::images::{ImageOperation, Images};

// Render and HTTP come straight from Crux.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub images: Images<Event>,
    pub alert: Alert<Event>,
}

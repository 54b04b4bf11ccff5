mod click;
mod destination;
mod short_link;

pub use click::{ClickEvent, Device, NewClickEvent};
pub use destination::{CreateDestinationRequest, Destination, UpdateDestinationRequest};
pub use short_link::{CreateShortLinkRequest, ShortLink, UpdateShortLinkRequest};

pub mod ads;
pub mod clicks;
pub mod ids;

pub use ads::Advertisement;
pub use clicks::{AdPosition, ClickError, ClickEvent};
pub use ids::SessionId;

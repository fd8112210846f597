pub mod slack;
pub mod traits;

pub use slack::SlackChannel;
pub use traits::{Channel, SendMessage};

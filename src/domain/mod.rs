pub mod user;
pub mod project;
pub mod invoice;
pub mod payment;
pub mod notification;
pub mod outbox;
pub mod email;

pub use user::*;
pub use project::*;
pub use invoice::*;
pub use payment::*;
pub use notification::*;
pub use outbox::*;
pub use email::*;

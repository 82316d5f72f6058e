mod channel;
mod guild;
mod member;
mod message;
mod role;
mod user;

pub use channel::Channel;
pub use guild::{Guild, GuildCreate, UnavailableGuild};
pub use member::Member;
pub use message::Message;
pub use role::Role;
pub use user::User;

use crate::values::Id;

/// Anything addressed by a snowflake
pub trait HasId {
    fn id(&self) -> Id;
}

macro_rules! impl_has_id {
    ($($ty:ty),*) => {
        $(impl HasId for $ty {
            fn id(&self) -> Id {
                self.id
            }
        })*
    };
}

impl_has_id!(Channel, Guild, Message, Role, User);

impl HasId for Member {
    fn id(&self) -> Id {
        self.user.id
    }
}

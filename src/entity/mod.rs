pub mod conversations;
pub mod favorites;
pub mod messages;
pub mod orders;
pub mod products;
pub mod users;

pub use conversations::Entity as Conversations;
pub use favorites::Entity as Favorites;
pub use messages::Entity as Messages;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use users::Entity as Users;

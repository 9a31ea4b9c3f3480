pub mod addresses;
pub mod users;

pub use addresses::AddressRepository;
pub use users::UserRepository;

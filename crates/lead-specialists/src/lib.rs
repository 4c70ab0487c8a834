pub mod prompts;
pub mod role_a;
pub mod role_b;
pub mod role_c;
pub mod time_parse;

pub use role_a::RoleA;
pub use role_b::RoleB;
pub use role_c::RoleC;

pub mod id_generator;
pub mod password;

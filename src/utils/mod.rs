pub mod image_utils;
pub mod password;
pub mod reference;
pub mod token;

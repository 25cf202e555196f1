pub mod db;
pub mod complaintdb;
pub mod userdb;

#[cfg(test)]
pub mod memory;

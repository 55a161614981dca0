pub mod mountinfo;
pub mod mtd;

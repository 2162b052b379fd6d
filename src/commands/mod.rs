pub mod fill;
pub mod platforms;

pub mod image_helper;

#[cfg(test)]
pub(crate) mod log_capture;

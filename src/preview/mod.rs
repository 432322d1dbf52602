// Preview pipeline: MJPEG extraction, frame decoding and the grab session.

pub mod capture;
pub mod codec;
pub mod extractor;

use std::io::Write;

use crate::camera::types::Frame;
use crate::common::error::Result;
use crate::output::types::{OutputFormat, OutputOptions};

pub trait ImageWriter {
    fn write_image(
        &self,
        image: &Frame,
        format: OutputFormat,
        output: &mut dyn Write,
        options: &OutputOptions,
    ) -> Result<()>;
}

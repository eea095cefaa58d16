//! Brainfuck to C translation, built as a four-stage pipeline:
//!
//! ```text
//! codepoints -> lexer -> codegen -> framer -> writer
//! ```
//!
//! `lexer` and `codegen` propagate the upstream end of stream; `framer`
//! re-frames it around the epilogue. The translation is purely textual:
//! unbalanced brackets are emitted as-is and will fail later in the C compiler.

mod codegen;
mod frame;
mod lexer;

pub use codegen::CodeGen;
pub use frame::{Framer, EPILOGUE, PROLOGUE};
pub use lexer::{Command, Lexer};

use crate::error::Result;
use crate::io::{CodePointSource, SharedBuffer, WriterSink};
use crate::pipeline::{Pipeline, PipelineBuilder, PipelineConfig, PipelineReport};
use std::io::{BufReader, Read, Write};

/// Wire the translation pipeline between `input` and `output` without starting it
pub fn build<R, W>(input: R, output: W, config: PipelineConfig) -> Result<Pipeline>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let pipeline = PipelineBuilder::with_config(config)
        .source(CodePointSource::new(BufReader::new(input)))?
        .stage(Lexer)
        .stage(CodeGen)
        .stage(Framer::new())
        .sink(WriterSink::<W, &'static str>::new(output));
    Ok(pipeline)
}

/// Translate everything readable from `input` and write the C program to `output`
pub fn translate<R, W>(input: R, output: W, config: PipelineConfig) -> Result<PipelineReport>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    build(input, output, config)?.run()
}

/// Translate a program held in memory
pub fn translate_str(program: &str) -> Result<String> {
    let buffer = SharedBuffer::new();
    let input = std::io::Cursor::new(program.as_bytes().to_vec());
    translate(input, buffer.clone(), PipelineConfig::default())?;
    Ok(buffer.to_string_lossy())
}

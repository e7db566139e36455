use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
};

use crate::{Display, DisplayLine};

pub const LCD_WIDTH: usize = 16;

/// HD44780-style panel behind the Linux `charlcd` driver (`/dev/lcd`).
#[derive(Debug, Clone)]
pub struct CharLcd {
    device: PathBuf,
    width: usize,
}

impl CharLcd {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            width: LCD_WIDTH,
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut device = OpenOptions::new().write(true).open(&self.device)?;
        device.write_all(bytes)?;
        device.flush()
    }
}

impl Display for CharLcd {
    fn show(&mut self, text: &str, line: DisplayLine) -> io::Result<()> {
        self.write(render_line(text, line, self.width).as_bytes())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.write(b"\x0c")
    }
}

/// Cursor-to-line escape followed by the text fitted to `width` columns.
/// Padding overwrites whatever the previous name left behind.
pub fn render_line(text: &str, line: DisplayLine, width: usize) -> String {
    let fitted: String = text
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .take(width)
        .collect();
    format!("\x1b[Lx0y{};{fitted:<width$}", line.index())
}

/// Bench stand-in that prints to stdout.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl Display for ConsoleDisplay {
    fn show(&mut self, text: &str, line: DisplayLine) -> io::Result<()> {
        println!("[lcd {}] {text}", line.index() + 1);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        println!("[lcd] cleared");
        Ok(())
    }
}

use std::io;

use serde_json::ser::Formatter;

/// Pretty printer that collapses containers below a given nesting depth onto
/// one line, so every key object reads as `{ "x": 0, "y": 0 }`.
#[derive(Debug, Clone)]
pub struct RowFormatter {
    indent: &'static [u8],
    inline_depth: usize,
    depth: usize,
    has_value: bool,
}

impl RowFormatter {
    /// Containers opened at `inline_depth` or deeper are written inline.
    /// The outermost container is depth 1.
    pub fn new(inline_depth: usize) -> Self {
        Self {
            indent: b"  ",
            inline_depth,
            depth: 0,
            has_value: false,
        }
    }

    fn inline(&self) -> bool {
        self.depth >= self.inline_depth
    }

    fn open<W>(&mut self, writer: &mut W, bracket: &[u8]) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.depth += 1;
        self.has_value = false;
        writer.write_all(bracket)
    }

    fn close<W>(&mut self, writer: &mut W, bracket: &[u8]) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let was_inline = self.inline();
        self.depth -= 1;
        if self.has_value {
            if was_inline {
                writer.write_all(b" ")?;
            } else {
                writer.write_all(b"\n")?;
                self.write_indent(writer)?;
            }
        }
        writer.write_all(bracket)
    }

    fn separate<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if self.inline() {
            return writer.write_all(if first { b" " } else { b", " });
        }
        writer.write_all(if first { b"\n" } else { b",\n" })?;
        self.write_indent(writer)
    }

    fn write_indent<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for _ in 0..self.depth {
            writer.write_all(self.indent)?;
        }
        Ok(())
    }
}

impl Formatter for RowFormatter {
    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.open(writer, b"[")
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.close(writer, b"]")
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.separate(writer, first)
    }

    fn end_array_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.open(writer, b"{")
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.close(writer, b"}")
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.separate(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn end_object_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.has_value = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    fn render(value: &serde_json::Value, inline_depth: usize) -> String {
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, RowFormatter::new(inline_depth));
        value.serialize(&mut ser).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn collapses_deep_objects() {
        let value = json!({"rows": [{"a": 1, "b": 2}, {"a": 3}]});
        assert_eq!(
            render(&value, 3),
            "{\n  \"rows\": [\n    { \"a\": 1, \"b\": 2 },\n    { \"a\": 3 }\n  ]\n}"
        );
    }

    #[test]
    fn empty_containers_stay_compact() {
        assert_eq!(render(&json!({"rows": []}), 3), "{\n  \"rows\": []\n}");
        assert_eq!(render(&json!([{}]), 2), "[\n  {}\n]");
    }
}

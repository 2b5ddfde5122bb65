/// Byte offsets of line starts in a text. Columns are counted in UTF-16 code
/// units, matching the printer and source maps.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(ix, _)| ix + 1));
        Self { text, starts }
    }

    /// Byte offset of a 0-based `(line, column)`, or `None` when the line does
    /// not exist, the column runs past its end or splits a surrogate pair.
    pub fn offset_for(&self, line: u32, column: u32) -> Option<usize> {
        let start = *self.starts.get(line as usize)?;
        let end = self
            .starts
            .get(line as usize + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());

        let mut units = 0;
        for (ix, c) in self.text[start..end].char_indices() {
            if units == column {
                return Some(start + ix);
            }
            if units > column {
                return None;
            }
            units += c.len_utf16() as u32;
        }
        (units == column).then_some(end)
    }

    /// 0-based `(line, column)` of a byte offset, clamped to the text.
    pub fn location_for(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.text.len());
        let line = self.starts.partition_point(|&s| s <= offset) - 1;
        let start = self.starts[line];
        let column = self
            .text
            .get(start..offset)
            .map(|s| s.encode_utf16().count())
            .unwrap_or(offset - start);
        (line as u32, column as u32)
    }
}

/// 串口行缓冲容量（字节）。
pub const LINE_CAPACITY: usize = 256;

/// 行读取器：逐字节累积，遇 `\n`/`\r` 产出一行。
///
/// 超过容量时缓冲回绕（写指针归零，之前的数据丢弃），不向上层报错；
/// 空行（裸换行符）不产出任何事件。
pub struct LineReader {
    buffer: Vec<u8>,
    capacity: usize,
}

impl LineReader {
    pub fn new() -> Self {
        Self::with_capacity(LINE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// 推入一个字节，产出完整行时返回 Some。
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if byte == b'\n' || byte == b'\r' {
            if self.buffer.is_empty() {
                return None;
            }
            let line = String::from_utf8_lossy(&self.buffer).to_string();
            self.buffer.clear();
            return Some(line);
        }
        if self.buffer.len() >= self.capacity {
            // 回绕：丢弃已累积的半行
            self.buffer.clear();
        }
        self.buffer.push(byte);
        None
    }

    /// 推入一批字节，逐行回调。
    pub fn push_bytes(&mut self, bytes: &[u8], mut on_line: impl FnMut(String)) {
        for &byte in bytes {
            if let Some(line) = self.push(byte) {
                on_line(line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_newline_terminated_line() {
        let mut reader = LineReader::new();
        let mut lines = Vec::new();
        reader.push_bytes(b"RFID_UID:224c8d04\n", |line| lines.push(line));
        assert_eq!(lines, vec!["RFID_UID:224c8d04".to_string()]);
    }

    #[test]
    fn carriage_return_also_terminates() {
        let mut reader = LineReader::new();
        assert_eq!(reader.push(b'a'), None);
        assert_eq!(reader.push(b'\r'), Some("a".to_string()));
    }

    #[test]
    fn bare_terminators_produce_nothing() {
        let mut reader = LineReader::new();
        let mut lines = Vec::new();
        reader.push_bytes(b"\r\n\r\n", |line| lines.push(line));
        assert!(lines.is_empty());
    }

    #[test]
    fn overflow_wraps_and_drops_partial_data() {
        let mut reader = LineReader::with_capacity(8);
        let mut lines = Vec::new();
        reader.push_bytes(b"0123456789AB\n", |line| lines.push(line));
        // 前 8 字节被回绕丢弃，仅留下回绕后的尾部
        assert_eq!(lines, vec!["89AB".to_string()]);
    }

    #[test]
    fn crlf_between_lines_keeps_both() {
        let mut reader = LineReader::new();
        let mut lines = Vec::new();
        reader.push_bytes(b"one\r\ntwo\n", |line| lines.push(line));
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }
}

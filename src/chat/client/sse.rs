/// Incremental server-sent events decoder.
///
/// Bytes go in as the network delivers them; the `data` payload of every
/// completed event comes out. Lines may be split anywhere, including inside a
/// multi-byte character.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(event) = self.feed_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Flushes a trailing event the server didn't terminate with a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned();
            if let Some(event) = self.feed_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }

        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }

        if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }

        // comments, `event:`, `id:` and `retry:` carry nothing we use
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        match self.data.is_empty() {
            true => None,
            false => Some(std::mem::take(&mut self.data).join("\n")),
        }
    }
}

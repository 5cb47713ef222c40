// 文档分块
// 固定窗口按字符切分，相邻块之间保留重叠

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// 分块器配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    /// 窗口步长，至少为 1
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }
}

/// 文档块
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    /// 字符偏移（非字节）
    pub start_char: usize,
    pub metadata: Map<String, Value>,
}

impl TextChunk {
    pub fn chunk_number(&self) -> Option<u64> {
        self.metadata.get("chunkNumber").and_then(Value::as_u64)
    }
}

pub struct TextChunker {
    config: ChunkerConfig,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// 每个块携带调用方的元数据和递增的 chunkNumber；空白块跳过且不占编号
    pub fn chunk(&self, text: &str, metadata: &Map<String, Value>) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut chunk_number: u64 = 0;

        for start in (0..chars.len()).step_by(self.config.step()) {
            let end = (start + self.config.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            if window.trim().is_empty() {
                continue;
            }

            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert("chunkNumber".to_string(), Value::from(chunk_number));
            chunk_number += 1;

            chunks.push(TextChunk {
                text: window,
                start_char: start,
                metadata: chunk_metadata,
            });
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> Map<String, Value> {
        json!({"source": "manual.txt"})
            .as_object()
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn test_window_boundaries() {
        let text = "a".repeat(900);
        let chunks = TextChunker::default().chunk(&text, &meta());

        let starts: Vec<usize> = chunks.iter().map(|c| c.start_char).collect();
        assert_eq!(starts, vec![0, 350, 700]);
        assert_eq!(chunks[0].text.chars().count(), 500);
        assert_eq!(chunks[1].text.chars().count(), 500);
        assert_eq!(chunks[2].text.chars().count(), 200);
    }

    #[test]
    fn test_overlap_and_metadata() {
        let text: String = (0..600).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = TextChunker::default().chunk(&text, &meta());

        assert_eq!(chunks.len(), 2);
        let tail: String = chunks[0].text.chars().skip(350).collect();
        let head: String = chunks[1].text.chars().take(150).collect();
        assert_eq!(tail, head);
        assert_eq!(chunks[1].metadata["source"], "manual.txt");
        assert_eq!(chunks[1].chunk_number(), Some(1));
    }

    #[test]
    fn test_multibyte_and_blank_windows() {
        let text = format!("{}{}", " ".repeat(500), "エンジン".repeat(50));
        let chunks = TextChunker::default().chunk(&text, &Map::new());

        // 第一个窗口全是空白
        assert_eq!(chunks[0].start_char, 350);
        assert_eq!(chunks[0].chunk_number(), Some(0));
        assert!(TextChunker::default().chunk("   ", &Map::new()).is_empty());
        assert!(TextChunker::default().chunk("", &Map::new()).is_empty());
    }
}

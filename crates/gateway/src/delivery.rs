//! Getting an answer to a chat user within LINE's message limits.

use pitchscout_config::GatewayConfig;
use tracing::{error, info, warn};

use crate::downloads::DownloadStore;
use crate::line::{LineClient, split_chars, utf16_len};

/// Pushed instead of an empty answer.
pub const EMPTY_ANSWER: &str = "❌ 系統在產生回覆時發生錯誤，請稍後再試。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryLimits {
    /// Largest answer, in UTF-16 code units, sent as a single message.
    pub inline_limit_utf16: usize,
    /// Piece size, in characters, when a single message was refused.
    pub split_chars: usize,
    /// Characters of the answer shown next to a download link.
    pub preview_chars: usize,
}

impl Default for DeliveryLimits {
    fn default() -> Self {
        Self {
            inline_limit_utf16: 5000,
            split_chars: 4000,
            preview_chars: 1500,
        }
    }
}

impl DeliveryLimits {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            inline_limit_utf16: config.inline_limit_utf16,
            split_chars: config.split_chars,
            preview_chars: config.preview_chars,
        }
    }
}

/// How an answer went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Inline,
    /// The single message failed; this many pieces were sent instead.
    Split { pieces: usize, delivered: usize },
    /// Too long to push; the user got a link to a saved file.
    Download { id: String, delivered: bool },
}

/// Text pushed in place of an over-long answer.
pub fn download_notice(link: &str, minutes: u64, preview: &str) -> String {
    format!(
        "📄 回答內容太長，請點此下載完整回答（連結 {minutes} 分鐘後失效）：\n{link}\n\n（預覽）\n{preview}...\n"
    )
}

pub async fn deliver_answer(
    client: &LineClient,
    downloads: &DownloadStore,
    limits: DeliveryLimits,
    to: &str,
    answer: &str,
) -> Delivery {
    let answer = if answer.trim().is_empty() {
        EMPTY_ANSWER
    } else {
        answer
    };

    let units = utf16_len(answer);
    if units <= limits.inline_limit_utf16 {
        if client.push(to, answer).await {
            return Delivery::Inline;
        }
        return push_pieces(client, to, answer, limits.split_chars).await;
    }

    info!(to, units, "Answer over the inline limit, saving for download");
    match downloads.save(answer).await {
        Ok(id) => {
            let preview: String = answer.chars().take(limits.preview_chars).collect();
            let minutes = downloads.ttl().as_secs() / 60;
            let notice = download_notice(&downloads.link(&id), minutes, &preview);
            let delivered = client.push(to, &notice).await;
            Delivery::Download { id, delivered }
        }
        Err(e) => {
            error!(error = %e, "Could not save download, sending in pieces");
            push_pieces(client, to, answer, limits.split_chars).await
        }
    }
}

async fn push_pieces(client: &LineClient, to: &str, answer: &str, size: usize) -> Delivery {
    let pieces = split_chars(answer, size);
    let mut delivered = 0;
    for piece in &pieces {
        if client.push(to, piece).await {
            delivered += 1;
        }
    }
    if delivered < pieces.len() {
        warn!(to, pieces = pieces.len(), delivered, "Some answer pieces were not delivered");
    }
    Delivery::Split {
        pieces: pieces.len(),
        delivered,
    }
}

//! Answer and condense prompts.

use pitchscout_core::message::{Message, Role};

/// Scouting-analyst instructions. Answers lead with the conclusion, use only
/// the supplied records, and mark anything inferred.
pub const ANSWER_TEMPLATE: &str = "
你是一位專業的棒球情蒐分析師，請根據美國隊投手的 2022 年資料，對使用者的問題全面分析與說明。

【內容原則】
- 結論優先，請先摘要出重點總結或建議（可條列），讓讀者能快速掌握核心資訊
- 僅依據提供的內容回答，**不得捏造任何未存在的資訊**
- 如有需進行推論的必要性，**請明確指出屬於推論的部分**
- 回答清楚、專業、易懂
- 回答後的內容依據從簡附註

【資料紀錄】
{context}

【問題】
{question}

【請輸出你的回答】
";

/// Fill the template. The question is substituted last so text inside the
/// retrieved records is never treated as a placeholder.
pub fn render(context: &str, question: &str) -> String {
    let (head, tail) = ANSWER_TEMPLATE
        .split_once("{context}")
        .unwrap_or((ANSWER_TEMPLATE, ""));
    format!("{head}{context}{}", tail.replace("{question}", question))
}

/// Conversation history followed by the filled template as the user turn.
pub fn build_messages(history: &[Message], context: &str, question: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend(history.iter().cloned());
    messages.push(Message::user(render(context, question)));
    messages
}

/// Rewrites a follow-up into a question that stands on its own, so that
/// retrieval and the answer template see who "he" is.
pub const CONDENSE_TEMPLATE: &str = "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

/// One line per message, prefixed with the speaker.
pub fn render_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Human",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            format!("\n{speaker}: {}", m.content)
        })
        .collect()
}

/// The condense request: a single user message.
pub fn condense_messages(history: &[Message], question: &str) -> Vec<Message> {
    let (head, tail) = CONDENSE_TEMPLATE
        .split_once("{chat_history}")
        .unwrap_or((CONDENSE_TEMPLATE, ""));
    let text = format!(
        "{head}{}{}",
        render_history(history),
        tail.replace("{question}", question)
    );
    vec![Message::user(text)]
}

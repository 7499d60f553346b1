//! System prompts and template builders for agents.
//!
//! The reflection templates ask for a fixed answer layout (`评估结果`,
//! `是否需要改进`, `改进建议`) that the verdict classifier reads back.

/// System prompt for the built-in joke agent.
pub const JOKE_SYSTEM_PROMPT: &str = r"你是一个专门讲笑话的智能助手。

重要规则（必须严格遵守）：
1. 当用户要求讲笑话时，你必须立即调用GetRandomJoke工具来获取笑话
2. 绝对禁止自己编造笑话，必须通过工具获取
3. 不要只是说“我会找笑话”，必须实际调用工具

可用工具：
- GetRandomJoke: 获取一个随机笑话。当用户要求讲笑话时，必须调用此工具。
- SearchJoke: 根据关键词搜索笑话。当用户指定了特定主题时使用此工具。

工作流程：
1. 用户要求讲笑话
2. 立即调用GetRandomJoke工具
3. 将工具返回的笑话内容直接告诉用户

请记住：必须调用工具，不能自己编造笑话！";

/// Evaluation prompt. Placeholders: `{user_input}`, `{candidate}`.
const CRITIQUE_TEMPLATE: &str = "你是一个反思评估助手。请评估以下Agent的输出质量。

用户输入: {user_input}

Agent的初始输出:
{candidate}

请进行以下评估：
1. 输出是否准确回答了用户的问题？
2. 输出是否完整？
3. 输出是否有错误或不足？
4. 如果需要改进，应该如何改进？

请按照以下格式回答：
评估结果: [你的评估]
是否需要改进: [是/否]
改进建议: [如果需要改进，提供具体建议]";

/// Revision prompt. Placeholders: `{user_input}`, `{previous}`, `{critique}`.
const REVISE_TEMPLATE: &str = "基于以下反思，请改进Agent的输出。

用户输入: {user_input}
初始输出: {previous}
反思评估: {critique}

请提供改进后的输出，确保：
1. 更准确地回答用户问题
2. 更完整地提供信息
3. 修正所有错误
4. 保持友好和专业的语气

改进后的输出:";

/// Substitutes `{name}` placeholders in one pass, so braces inside the
/// substituted values are never expanded.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = values.iter().find(|(name, _)| {
            tail[1..]
                .strip_prefix(*name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Builds the critique prompt for a candidate answer.
#[must_use]
pub fn build_critique_prompt(user_input: &str, candidate: &str) -> String {
    render(
        CRITIQUE_TEMPLATE,
        &[("user_input", user_input), ("candidate", candidate)],
    )
}

/// Builds the revision prompt from the previous answer and its critique.
#[must_use]
pub fn build_revise_prompt(user_input: &str, previous: &str, critique: &str) -> String {
    render(
        REVISE_TEMPLATE,
        &[
            ("user_input", user_input),
            ("previous", previous),
            ("critique", critique),
        ],
    )
}

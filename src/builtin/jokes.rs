//! Joke tools over a fixed joke list.

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::agent::{FnTool, Tool};

/// Tool group holding the joke tools.
pub const JOKE_GROUP: &str = "joke";

/// The joke list.
pub const JOKES: [&str; 8] = [
    "为什么程序员总是分不清万圣节和圣诞节？因为 Oct 31 == Dec 25！",
    "一个SQL查询走进酒吧，看到两个表，然后说：我可以加入你们吗？",
    "为什么Python不用花括号？因为它想保持简洁！",
    "为什么程序员喜欢用暗色主题？因为bug也喜欢暗色！",
    "程序员最讨厌的事情是什么？没有注释的代码，还有有注释的代码！",
    "为什么程序员总是分不清白天和黑夜？因为他们一直在debug！",
    "一个变量走进酒吧，酒保说：抱歉，我们不服务未初始化的变量。",
    "为什么程序员不喜欢自然？因为那里有太多bug！",
];

/// A random joke. The input is ignored.
#[must_use]
pub fn random_joke() -> &'static str {
    JOKES.choose(&mut rand::thread_rng()).copied().unwrap_or(JOKES[0])
}

/// A random joke containing `keyword`, case-insensitively.
#[must_use]
pub fn search_joke(keyword: &str) -> String {
    let needle = keyword.trim().to_lowercase();
    let matching: Vec<&str> = JOKES
        .iter()
        .copied()
        .filter(|joke| joke.to_lowercase().contains(&needle))
        .collect();
    matching.choose(&mut rand::thread_rng()).map_or_else(
        || format!("抱歉，没找到包含'{}'的笑话", keyword.trim()),
        ToString::to_string,
    )
}

/// `GetRandomJoke` and `SearchJoke`.
#[must_use]
pub fn joke_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        FnTool::new(
            "GetRandomJoke",
            "获取一个随机笑话。当用户要求讲笑话时使用此工具。输入可以是任意字符串，如'joke'。",
            |_| Ok(random_joke().to_string()),
        )
        .shared(),
        FnTool::new(
            "SearchJoke",
            "根据关键词搜索笑话。当用户指定了特定主题时使用此工具。输入应该是单个关键词，如'程序员'、'Python'、'bug'。",
            |keyword| Ok(search_joke(keyword)),
        )
        .shared(),
    ]
}

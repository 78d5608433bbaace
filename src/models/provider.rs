use serde::{Deserialize, Serialize};

/// 供应商门户
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Suizo Argentina
    Suizo,
    /// Del Sud
    DelSud,
    /// Monroe Americana (MASA)
    Monroe,
}

/// 表格中常见的供应商写法 → 标准供应商
static PROVIDER_ALIASES: phf::Map<&'static str, ProviderId> = phf::phf_map! {
    "suizo" => ProviderId::Suizo,
    "suizo argentina" => ProviderId::Suizo,
    "del sud" => ProviderId::DelSud,
    "delsud" => ProviderId::DelSud,
    "del_sud" => ProviderId::DelSud,
    "drogueria del sud" => ProviderId::DelSud,
    "monroe" => ProviderId::Monroe,
    "monroe americana" => ProviderId::Monroe,
    "masa" => ProviderId::Monroe,
};

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Suizo, ProviderId::DelSud, ProviderId::Monroe];

    /// 显示名称
    pub fn name(self) -> &'static str {
        match self {
            ProviderId::Suizo => "Suizo",
            ProviderId::DelSud => "Del Sud",
            ProviderId::Monroe => "Monroe",
        }
    }

    /// 环境变量前缀（凭据、门户地址）
    pub fn env_prefix(self) -> &'static str {
        match self {
            ProviderId::Suizo => "SUIZO",
            ProviderId::DelSud => "DELSUD",
            ProviderId::Monroe => "MONROE",
        }
    }

    /// 文件路径中使用的短名
    pub fn slug(self) -> &'static str {
        match self {
            ProviderId::Suizo => "suizo",
            ProviderId::DelSud => "del_sud",
            ProviderId::Monroe => "monroe",
        }
    }

    /// 从表格中的供应商名称解析
    ///
    /// 先查别名表（精确匹配），再按整词模糊匹配
    pub fn from_name(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        if let Some(provider) = PROVIDER_ALIASES.get(normalized.as_str()) {
            return Some(*provider);
        }

        // 模糊匹配，例如 "SUIZO ARGENTINA S.A."；别名必须是完整的词
        let name_words = words(&normalized);
        let mut aliases: Vec<(&&str, &ProviderId)> = PROVIDER_ALIASES.entries().collect();
        aliases.sort_by_key(|(alias, _)| std::cmp::Reverse(alias.len()));
        aliases
            .into_iter()
            .find(|(alias, _)| {
                let alias_words = words(alias);
                !alias_words.is_empty()
                    && name_words
                        .windows(alias_words.len())
                        .any(|window| window == alias_words.as_slice())
            })
            .map(|(_, provider)| *provider)
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

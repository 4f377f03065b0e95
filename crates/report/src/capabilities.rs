//! Which optional chat-completion parameters each model family accepts.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLimitParam {
    MaxTokens,
    MaxCompletionTokens,
}

impl OutputLimitParam {
    pub fn field_name(self) -> &'static str {
        match self {
            OutputLimitParam::MaxTokens => "max_tokens",
            OutputLimitParam::MaxCompletionTokens => "max_completion_tokens",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub temperature: bool,
    pub output_limit: OutputLimitParam,
}

const REASONING: ModelCapabilities = ModelCapabilities {
    temperature: false,
    output_limit: OutputLimitParam::MaxCompletionTokens,
};

const CHAT: ModelCapabilities = ModelCapabilities {
    temperature: true,
    output_limit: OutputLimitParam::MaxCompletionTokens,
};

const LEGACY_CHAT: ModelCapabilities = ModelCapabilities {
    temperature: true,
    output_limit: OutputLimitParam::MaxTokens,
};

/// Model id prefix -> capabilities. The longest matching prefix wins.
pub const MODEL_CAPABILITIES: &[(&str, ModelCapabilities)] = &[
    ("gpt-5", REASONING),
    ("o1", REASONING),
    ("o3", REASONING),
    ("o4", REASONING),
    ("gpt-4.1", CHAT),
    ("gpt-4o", CHAT),
    ("gpt-4", LEGACY_CHAT),
    ("gpt-3.5", LEGACY_CHAT),
];

/// Used for ids the table does not know.
pub const UNKNOWN_MODEL: ModelCapabilities = REASONING;

pub fn capabilities_for(model: &str) -> ModelCapabilities {
    MODEL_CAPABILITIES
        .iter()
        .filter(|(prefix, _)| model.starts_with(*prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, caps)| *caps)
        .unwrap_or(UNKNOWN_MODEL)
}

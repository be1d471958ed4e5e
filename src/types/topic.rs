use serde::{Deserialize, Serialize};

use crate::generator::error::PipelineError;

/// 演示文稿主题，取值集合固定
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[serde(rename = "Minimalist_Dark")]
    MinimalistDark,
    #[serde(rename = "Business_Corporate")]
    BusinessCorporate,
    #[serde(rename = "Education_Creative")]
    EducationCreative,
    #[serde(rename = "Historical_Vintage")]
    HistoricalVintage,
    #[serde(rename = "Technology_Futuristic")]
    TechnologyFuturistic,
    #[serde(rename = "Environmental_Natural")]
    EnvironmentalNatural,
    #[serde(rename = "default")]
    #[default]
    Default,
}

impl Theme {
    pub const ALL: [Theme; 7] = [
        Theme::MinimalistDark,
        Theme::BusinessCorporate,
        Theme::EducationCreative,
        Theme::HistoricalVintage,
        Theme::TechnologyFuturistic,
        Theme::EnvironmentalNatural,
        Theme::Default,
    ];

    /// 主题在请求与文件名中使用的标识
    pub fn identifier(&self) -> &'static str {
        match self {
            Theme::MinimalistDark => "Minimalist_Dark",
            Theme::BusinessCorporate => "Business_Corporate",
            Theme::EducationCreative => "Education_Creative",
            Theme::HistoricalVintage => "Historical_Vintage",
            Theme::TechnologyFuturistic => "Technology_Futuristic",
            Theme::EnvironmentalNatural => "Environmental_Natural",
            Theme::Default => "default",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Theme::ALL
            .into_iter()
            .find(|theme| theme.identifier().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown theme: {}", s))
    }
}

/// 一次生成请求的原始输入，尚未校验
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            author: None,
            theme: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// 在流水线启动前校验请求，得到不可变的 Topic
    pub fn validate(&self) -> Result<Topic, PipelineError> {
        let text = self.topic.trim();
        if text.is_empty() {
            return Err(PipelineError::Validation(
                "topic must not be empty".to_string(),
            ));
        }

        let theme = match self.theme.as_deref().map(str::trim) {
            None | Some("") => Theme::default(),
            Some(raw) => raw
                .parse::<Theme>()
                .map_err(PipelineError::Validation)?,
        };

        let author = self
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(Topic {
            text: text.to_string(),
            author,
            theme,
        })
    }
}

/// 校验后的主题输入，流水线启动后不再变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    text: String,
    author: Option<String>,
    theme: Theme,
}

impl Topic {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }
}

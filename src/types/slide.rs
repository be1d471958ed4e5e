use serde::{Deserialize, Serialize};

use crate::types::topic::Theme;

/// 幻灯片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideKind {
    Title,
    Agenda,
    KeyPoint,
    Conclusion,
}

impl std::fmt::Display for SlideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            SlideKind::Title => "title",
            SlideKind::Agenda => "agenda",
            SlideKind::KeyPoint => "key_point",
            SlideKind::Conclusion => "conclusion",
        };
        write!(f, "{}", str)
    }
}

/// 大纲固定形态：封面、议程、四个要点、结论
pub const OUTLINE_SHAPE: [SlideKind; 7] = [
    SlideKind::Title,
    SlideKind::Agenda,
    SlideKind::KeyPoint,
    SlideKind::KeyPoint,
    SlideKind::KeyPoint,
    SlideKind::KeyPoint,
    SlideKind::Conclusion,
];

pub const KEY_POINT_COUNT: usize = 4;

/// 大纲中规划的一张幻灯片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSpec {
    pub kind: SlideKind,
    /// 从1开始的位置
    pub position: usize,
    pub title: String,
    /// 议程页携带各要点标题
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub talking_points: Vec<String>,
}

impl SlideSpec {
    pub fn new(kind: SlideKind, position: usize, title: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            title: title.into(),
            talking_points: Vec::new(),
        }
    }

    pub fn with_talking_points(mut self, points: Vec<String>) -> Self {
        self.talking_points = points;
        self
    }
}

/// 单张幻灯片的生成内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideContent {
    pub spec: SlideSpec,
    pub bullets: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    /// 生成失败后使用了占位内容
    #[serde(default)]
    pub degraded: bool,
}

impl SlideContent {
    pub const PLACEHOLDER_BULLET: &'static str = "Content for this slide could not be generated.";

    /// 生成失败时的降级内容，保留标题
    pub fn placeholder(spec: SlideSpec) -> Self {
        Self {
            spec,
            bullets: vec![Self::PLACEHOLDER_BULLET.to_string()],
            references: Vec::new(),
            degraded: true,
        }
    }
}

/// 交给组装方的完整演示内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationContent {
    pub topic: String,
    pub author: Option<String>,
    pub theme: Theme,
    pub slides: Vec<SlideContent>,
}

impl PresentationContent {
    pub fn degraded_positions(&self) -> Vec<usize> {
        self.slides
            .iter()
            .filter(|slide| slide.degraded)
            .map(|slide| slide.spec.position)
            .collect()
    }
}

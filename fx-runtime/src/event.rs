//! # Event 模块
//!
//! 外部事件源向 HUD 投递的领域事件，以及注入式的事件订阅接口。
//!
//! 事件源不是全局单例：宿主把实现了 [`EventSource`] 的对象交给消费方，
//! 测试中可以直接用 `Vec<FxEvent>` 代替。

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::math::Vec2;

/// 事件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// 玩家受到伤害
    DamageTaken,
    /// 玩家造成伤害（命中）
    DamageDealt,
    /// 击杀确认
    KillConfirmed,
    /// 附近脚步声
    Footstep,
    /// 普通通知
    Notification,
    /// 成就解锁
    Achievement,
    /// 血量变化（magnitude 为血量比例）
    HealthChanged,
}

impl EventCategory {
    /// 类别名称（用于日志和错误信息）
    pub fn name(&self) -> &'static str {
        match self {
            EventCategory::DamageTaken => "damage_taken",
            EventCategory::DamageDealt => "damage_dealt",
            EventCategory::KillConfirmed => "kill_confirmed",
            EventCategory::Footstep => "footstep",
            EventCategory::Notification => "notification",
            EventCategory::Achievement => "achievement",
            EventCategory::HealthChanged => "health_changed",
        }
    }

    /// 该类别是否必须携带 magnitude
    pub fn requires_magnitude(&self) -> bool {
        matches!(
            self,
            EventCategory::DamageTaken | EventCategory::DamageDealt | EventCategory::HealthChanged
        )
    }

    /// 该类别是否必须携带文本
    pub fn requires_text(&self) -> bool {
        matches!(
            self,
            EventCategory::KillConfirmed | EventCategory::Notification | EventCategory::Achievement
        )
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 事件方向
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// 向量（不要求已归一化）
    Vector(Vec2),
    /// 角度（弧度）
    Angle(f32),
}

impl Direction {
    /// 转为单位向量
    pub fn to_vec2(self) -> Vec2 {
        match self {
            Direction::Vector(v) => v.normalize_or_zero(),
            Direction::Angle(radians) => Vec2::from_angle(radians),
        }
    }

    fn is_finite(self) -> bool {
        match self {
            Direction::Vector(v) => v.is_finite(),
            Direction::Angle(radians) => radians.is_finite(),
        }
    }
}

/// 事件标记位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventFlags(u8);

impl EventFlags {
    pub const NONE: Self = Self(0);
    /// 暴击
    pub const CRITICAL: Self = Self(1);
    /// 爆头
    pub const HEADSHOT: Self = Self(1 << 1);
    /// 致命一击
    pub const KILL: Self = Self(1 << 2);
    /// 护甲被击穿
    pub const ARMOR_BREAK: Self = Self(1 << 3);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 领域事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxEvent {
    pub category: EventCategory,
    #[serde(default)]
    pub magnitude: Option<f32>,
    #[serde(default)]
    pub direction: Option<Direction>,
    /// 关联 ID（用于堆叠）
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub flags: EventFlags,
    /// 展示文本（通知、击杀信息、成就名）
    #[serde(default)]
    pub text: Option<String>,
}

impl FxEvent {
    pub fn new(category: EventCategory) -> Self {
        Self {
            category,
            magnitude: None,
            direction: None,
            correlation_id: None,
            flags: EventFlags::NONE,
            text: None,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f32) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_correlation(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// 校验事件载荷
    ///
    /// 缺少必需字段或数值非法时返回错误，调用方应忽略该事件。
    pub fn validate(&self) -> Result<(), EventError> {
        let category = self.category.name();

        match self.magnitude {
            None if self.category.requires_magnitude() => {
                return Err(EventError::MissingField {
                    category,
                    field: "magnitude",
                });
            }
            Some(value) if !value.is_finite() => {
                return Err(EventError::NonFinite {
                    category,
                    field: "magnitude",
                    value,
                });
            }
            Some(value) if value < 0.0 => {
                return Err(EventError::Negative {
                    category,
                    field: "magnitude",
                    value,
                });
            }
            _ => {}
        }

        if let Some(direction) = self.direction
            && !direction.is_finite()
        {
            return Err(EventError::NonFinite {
                category,
                field: "direction",
                value: f32::NAN,
            });
        }

        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if self.category.requires_text() && !has_text {
            return Err(EventError::MissingField {
                category,
                field: "text",
            });
        }

        Ok(())
    }
}

/// 事件订阅接口
///
/// 每帧由消费方调用一次，取出自上次以来到达的全部事件。
pub trait EventSource {
    fn poll(&mut self) -> Vec<FxEvent>;
}

impl EventSource for Vec<FxEvent> {
    fn poll(&mut self) -> Vec<FxEvent> {
        std::mem::take(self)
    }
}

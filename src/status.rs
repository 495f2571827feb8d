// Delivery status and the display data attached to each variant.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Completed,
    InProgress,
    Delayed,
    NotStarted,
    Paused,
}

/// Badge tone used by the table and status cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Blue,
    Red,
    Gray,
    Yellow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStyle {
    pub label: &'static str,
    pub chart_label: &'static str,
    pub color: &'static str,
    pub tone: Tone,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Completed,
        Status::InProgress,
        Status::Delayed,
        Status::NotStarted,
        Status::Paused,
    ];

    /// Parse a backend status label. Unknown labels fall back to `NotStarted`.
    pub fn parse(raw: &str) -> Status {
        match raw.trim().to_uppercase().as_str() {
            "CONCLUÍDA" | "CONCLUIDA" => Status::Completed,
            "EM ANDAMENTO" => Status::InProgress,
            "ATRASADA" => Status::Delayed,
            "PAUSADA" => Status::Paused,
            _ => Status::NotStarted,
        }
    }

    /// Label stored by the data service, used in query predicates.
    pub fn as_str(self) -> &'static str {
        self.style().label
    }

    /// Every stored spelling `parse` maps to this status.
    ///
    /// `NotStarted` also absorbs null and unrecognised labels, which cannot
    /// be listed here.
    pub fn stored_labels(self) -> &'static [&'static str] {
        match self {
            Status::Completed => &["CONCLUÍDA", "CONCLUIDA"],
            Status::InProgress => &["EM ANDAMENTO"],
            Status::Delayed => &["ATRASADA"],
            Status::NotStarted => &["NÃO INICIADA", "NAO INICIADA"],
            Status::Paused => &["PAUSADA"],
        }
    }

    pub fn style(self) -> StatusStyle {
        match self {
            Status::Completed => StatusStyle {
                label: "CONCLUÍDA",
                chart_label: "Concluídas",
                color: "#10B981",
                tone: Tone::Green,
            },
            Status::InProgress => StatusStyle {
                label: "EM ANDAMENTO",
                chart_label: "Em Andamento",
                color: "#3B82F6",
                tone: Tone::Blue,
            },
            Status::Delayed => StatusStyle {
                label: "ATRASADA",
                chart_label: "Atrasadas",
                color: "#EF4444",
                tone: Tone::Red,
            },
            Status::NotStarted => StatusStyle {
                label: "NÃO INICIADA",
                chart_label: "Não Iniciadas",
                color: "#6B7280",
                tone: Tone::Gray,
            },
            Status::Paused => StatusStyle {
                label: "PAUSADA",
                chart_label: "Pausadas",
                color: "#F59E0B",
                tone: Tone::Yellow,
            },
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Status::parse).unwrap_or(Status::NotStarted))
    }
}

/// Colour band of an execution-percentage progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressBand {
    High,
    Medium,
    Low,
    Critical,
}

impl ProgressBand {
    pub fn for_percentage(pct: f64) -> ProgressBand {
        if pct >= 80.0 {
            ProgressBand::High
        } else if pct >= 50.0 {
            ProgressBand::Medium
        } else if pct >= 30.0 {
            ProgressBand::Low
        } else {
            ProgressBand::Critical
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            ProgressBand::High => Tone::Green,
            ProgressBand::Medium => Tone::Blue,
            ProgressBand::Low => Tone::Yellow,
            ProgressBand::Critical => Tone::Red,
        }
    }
}

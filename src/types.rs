use crate::status::Status;
use crate::util::{deserialize_id, deserialize_lenient_date, deserialize_opt_id};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Department columns embedded into a delivery row by the data service join.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DepartmentRef {
    #[serde(rename = "sigla")]
    pub code: Option<String>,
    #[serde(rename = "nome_completo")]
    pub name: Option<String>,
    #[serde(rename = "cor_primaria")]
    pub primary_color: Option<String>,
    #[serde(rename = "cor_secundaria", default)]
    pub secondary_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeliveryRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "secretaria_id", default, deserialize_with = "deserialize_opt_id")]
    pub department_id: Option<String>,
    #[serde(rename = "codigo_entrega", default)]
    pub code: Option<String>,
    #[serde(rename = "descricao_entrega", default)]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: Status,
    #[serde(rename = "percentual_execucao", default)]
    pub execution_pct: Option<f64>,
    #[serde(rename = "ano_referencia")]
    pub year: i32,
    #[serde(rename = "mes_referencia")]
    pub month: u32,
    #[serde(rename = "data_inicio", default, deserialize_with = "deserialize_lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "data_termino", default, deserialize_with = "deserialize_lenient_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub interlocutor: Option<String>,
    #[serde(rename = "secretarias", default)]
    pub department: Option<DepartmentRef>,
}

fn default_status() -> Status {
    Status::NotStarted
}

impl DeliveryRecord {
    /// Department code from the join, if the record has a resolvable one.
    pub fn department_code(&self) -> Option<&str> {
        self.department
            .as_ref()
            .and_then(|d| d.code.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Execution percentage; a missing value counts as 0.
    pub fn pct(&self) -> f64 {
        self.execution_pct.filter(|p| p.is_finite()).unwrap_or(0.0)
    }

    pub fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Department {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "sigla")]
    pub code: String,
    #[serde(rename = "nome_completo", default)]
    pub name: String,
    #[serde(rename = "cor_primaria", default)]
    pub primary_color: Option<String>,
    #[serde(rename = "cor_secundaria", default)]
    pub secondary_color: Option<String>,
    #[serde(rename = "ativo", default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A calendar (year, month) bucket. Ordering is lexicographic on (year, month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub delayed: usize,
    pub not_started: usize,
    pub paused: usize,
    pub average_pct: f64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSlice {
    pub status: Status,
    pub name: &'static str,
    pub value: usize,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentSummary {
    pub code: String,
    pub name: String,
    pub color: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub delayed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub pct_sum: f64,
    pub average_pct: f64,
    pub completion_rate: f64,
    pub delay_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub label: String,
    pub total: usize,
    pub completed: usize,
    pub delayed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub pct_sum: f64,
    pub average_pct: f64,
    pub completion_rate: f64,
    pub delay_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub code: String,
    pub name: String,
    pub color: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub completion_rate: f64,
    pub average_pct: f64,
    pub score: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DepartmentRow {
    #[serde(rename = "Secretaria")]
    #[tabled(rename = "Secretaria")]
    pub code: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Concluídas")]
    #[tabled(rename = "Concluídas")]
    pub completed: usize,
    #[serde(rename = "Atrasadas")]
    #[tabled(rename = "Atrasadas")]
    pub delayed: usize,
    #[serde(rename = "Em Andamento")]
    #[tabled(rename = "Em Andamento")]
    pub in_progress: usize,
    #[serde(rename = "Percentual Médio (%)")]
    #[tabled(rename = "Percentual Médio (%)")]
    pub average_pct: String,
    #[serde(rename = "Taxa Conclusão (%)")]
    #[tabled(rename = "Taxa Conclusão (%)")]
    pub completion_rate: String,
    #[serde(rename = "Taxa Atraso (%)")]
    #[tabled(rename = "Taxa Atraso (%)")]
    pub delay_rate: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PeriodRow {
    #[serde(rename = "Período")]
    #[tabled(rename = "Período")]
    pub label: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Concluídas")]
    #[tabled(rename = "Concluídas")]
    pub completed: usize,
    #[serde(rename = "Percentual Médio (%)")]
    #[tabled(rename = "Percentual Médio (%)")]
    pub average_pct: String,
    #[serde(rename = "Taxa Conclusão (%)")]
    #[tabled(rename = "Taxa Conclusão (%)")]
    pub completion_rate: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankingRow {
    #[serde(rename = "Posição")]
    #[tabled(rename = "Posição")]
    pub rank: usize,
    #[serde(rename = "Secretaria")]
    #[tabled(rename = "Secretaria")]
    pub code: String,
    #[serde(rename = "Nome Completo")]
    #[tabled(rename = "Nome Completo")]
    pub name: String,
    #[serde(rename = "Total Entregas")]
    #[tabled(rename = "Total Entregas")]
    pub total: usize,
    #[serde(rename = "Concluídas")]
    #[tabled(rename = "Concluídas")]
    pub completed: usize,
    #[serde(rename = "Taxa Conclusão (%)")]
    #[tabled(rename = "Taxa Conclusão (%)")]
    pub completion_rate: String,
    #[serde(rename = "Percentual Médio (%)")]
    #[tabled(rename = "Percentual Médio (%)")]
    pub average_pct: String,
    #[serde(rename = "Pontuação")]
    #[tabled(rename = "Pontuação")]
    pub score: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DeliveryRow {
    #[serde(rename = "Secretaria")]
    #[tabled(rename = "Secretaria")]
    pub department: String,
    #[serde(rename = "Código")]
    #[tabled(rename = "Código")]
    pub code: String,
    #[serde(rename = "Entrega")]
    #[tabled(rename = "Entrega")]
    pub description: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Progresso (%)")]
    #[tabled(rename = "Progresso (%)")]
    pub progress: String,
    #[serde(rename = "Data Início")]
    #[tabled(rename = "Data Início")]
    pub start_date: String,
    #[serde(rename = "Data Término")]
    #[tabled(rename = "Data Término")]
    pub end_date: String,
    #[serde(rename = "Interlocutor")]
    #[tabled(rename = "Interlocutor")]
    pub interlocutor: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub generated_on: NaiveDate,
    pub overview: Overview,
    pub departments: usize,
    pub periods: usize,
    pub leader: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_joined_delivery_row() {
        let json = r##"{
            "id": 17,
            "secretaria_id": 3,
            "codigo_entrega": "E-01",
            "descricao_entrega": "Reforma da UBS",
            "status": "EM ANDAMENTO",
            "percentual_execucao": 42.5,
            "ano_referencia": 2025,
            "mes_referencia": 8,
            "data_inicio": "2025-01-10",
            "data_termino": null,
            "interlocutor": "Maria",
            "secretarias": {"sigla": "SESAU", "nome_completo": "Secretaria de Saúde", "cor_primaria": "#0EA5E9"}
        }"##;
        let rec: DeliveryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.id, "17");
        assert_eq!(rec.department_id.as_deref(), Some("3"));
        assert_eq!(rec.status, Status::InProgress);
        assert_eq!(rec.department_code(), Some("SESAU"));
        assert_eq!(rec.start_date, NaiveDate::from_ymd_opt(2025, 1, 10));
        assert_eq!(rec.end_date, None);
        assert_eq!(rec.period(), Period { year: 2025, month: 8 });
    }

    #[test]
    fn missing_join_and_percentage_are_tolerated() {
        let json = r#"{"id": "a", "status": "???", "percentual_execucao": null,
                       "ano_referencia": 2024, "mes_referencia": 1, "secretarias": null}"#;
        let rec: DeliveryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.department_code(), None);
        assert_eq!(rec.pct(), 0.0);
        assert_eq!(rec.status, Status::NotStarted);
    }

    #[test]
    fn blank_department_code_is_unresolvable() {
        let json = r#"{"id": "a", "ano_referencia": 2024, "mes_referencia": 1,
                       "secretarias": {"sigla": "  ", "nome_completo": null, "cor_primaria": null}}"#;
        let rec: DeliveryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.department_code(), None);
    }

    #[test]
    fn periods_order_by_year_then_month() {
        let a = Period { year: 2024, month: 12 };
        let b = Period { year: 2025, month: 1 };
        let c = Period { year: 2025, month: 3 };
        assert!(a < b && b < c);
    }
}

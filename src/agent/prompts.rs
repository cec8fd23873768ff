//! Prompt construction and context formatting for the workflows

use crate::models::{Account, Budget, ForecastPoint, Goal, SpendingPattern, Transaction};

/// Cut `text` to at most `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Absolute mean of the negative amounts; 0.0 when there are none.
pub fn calculate_avg_expense(transactions: &[Transaction]) -> f64 {
    let expenses: Vec<f64> = transactions
        .iter()
        .map(|t| t.amount)
        .filter(|amount| *amount < 0.0)
        .collect();

    if expenses.is_empty() {
        return 0.0;
    }
    (expenses.iter().sum::<f64>() / expenses.len() as f64).abs()
}

pub fn total_balance(accounts: &[Account]) -> f64 {
    accounts.iter().map(|a| a.balance).sum()
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn budget_line(budget: &Budget) -> String {
    format!(
        "- {}: límite {} ({} a {})",
        budget.category,
        budget.limit_amount,
        or_na(budget.period_start.as_deref()),
        or_na(budget.period_end.as_deref()),
    )
}

pub fn budget_context(budgets: &[Budget], transactions: &[Transaction]) -> String {
    let mut lines = vec!["Presupuestos actuales:".to_string()];
    lines.extend(budgets.iter().map(budget_line));

    lines.push("\nTransacciones recientes:".to_string());
    for t in transactions.iter().take(10) {
        lines.push(format!(
            "- {}: {} en {} ({})",
            or_na(t.date.as_deref()),
            t.amount,
            or_na(t.category.as_deref()),
            or_na(t.description.as_deref()),
        ));
    }
    lines.join("\n")
}

pub fn format_patterns(patterns: &[SpendingPattern]) -> String {
    if patterns.is_empty() {
        return "No hay patrones detectados.".to_string();
    }
    patterns
        .iter()
        .take(5)
        .map(|p| {
            let frequency = p
                .frequency
                .as_ref()
                .map(|f| match f.as_str() {
                    Some(s) => s.to_string(),
                    None => f.to_string(),
                })
                .unwrap_or_else(|| "N/A".to_string());
            format!(
                "- {}: {} (frecuencia: {}, promedio: {})",
                or_na(p.pattern_type.as_deref()),
                or_na(p.description.as_deref()),
                frequency,
                p.average_amount,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_forecast(forecast: &[ForecastPoint]) -> String {
    if forecast.is_empty() {
        return "No hay pronóstico disponible.".to_string();
    }
    forecast
        .iter()
        .take(3)
        .map(|f| {
            let month = f.forecast_month.map(|m| m.to_string()).unwrap_or_else(|| "?".into());
            let year = f.forecast_year.map(|y| y.to_string()).unwrap_or_else(|| "?".into());
            format!(
                "- {}/{}: {} (tendencia: {})",
                month,
                year,
                f.predicted_amount,
                or_na(f.trend.as_deref()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_budgets(budgets: &[Budget]) -> String {
    if budgets.is_empty() {
        return "Sin presupuestos configurados.".to_string();
    }
    budgets
        .iter()
        .take(5)
        .map(budget_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_goals(goals: &[Goal]) -> String {
    if goals.is_empty() {
        return "Sin metas configuradas.".to_string();
    }
    goals
        .iter()
        .take(5)
        .map(|g| {
            format!(
                "- {}: {:.0}% completado (meta: {})",
                or_na(g.name.as_deref()),
                g.progress_percent(),
                g.target_amount,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_accounts(accounts: &[Account]) -> String {
    if accounts.is_empty() {
        return "Sin cuentas.".to_string();
    }
    format!(
        "Balance total: {} en {} cuenta(s).",
        total_balance(accounts),
        accounts.len()
    )
}

pub fn budget_audit_prompt(context: &str) -> String {
    format!(
        r#"Eres un asesor financiero. Analiza el siguiente contexto y genera recomendaciones concretas:

{context}

Responde en formato JSON con:
- "alerts": lista de alertas detectadas (si hay)
- "recommendations": lista de recomendaciones prácticas
- "summary": resumen breve
"#
    )
}

pub fn document_prompt(extracted_text: &str) -> String {
    format!(
        r#"Eres un asistente financiero. Analiza el siguiente texto de un documento y extrae:
- Monto (número)
- Categoría (ej: "Alimentación", "Transporte", "Salud")
- Descripción breve

Texto:
{extracted_text}

Responde en formato JSON:
{{"amount": <número>, "category": "<categoría>", "description": "<descripción>"}}
"#
    )
}

pub fn savings_plan_prompt(target: f64, months: u32, balance: f64, avg_expense: f64) -> String {
    format!(
        r#"Eres un asesor financiero. El usuario quiere ahorrar {target} en {months} meses.
Balance actual: {balance}
Gasto promedio mensual: {avg_expense}

Genera un plan de ahorro mensual realista en formato JSON:
{{"monthly_savings": <monto>, "recommendations": ["<consejo1>", "<consejo2>"], "feasibility": "<análisis>"}}
"#
    )
}

pub fn categorization_prompt(text: &str, amount: f64, predicted: &str, confidence: f64) -> String {
    format!(
        r#"Analiza esta transacción y sugiere la mejor categoría:
Texto: {text}
Monto: {amount}
ML sugiere: {predicted} (confianza: {confidence:.2})

Responde solo con el nombre de la categoría más apropiada.
"#
    )
}

pub struct InsightsContext<'a> {
    pub patterns: &'a [SpendingPattern],
    pub forecast: &'a [ForecastPoint],
    pub budgets: &'a [Budget],
    pub goals: &'a [Goal],
    pub accounts: &'a [Account],
}

pub fn insights_prompt(ctx: &InsightsContext<'_>) -> String {
    format!(
        r#"Análisis financiero del usuario:

PATRONES DE GASTO (últimos 90 días):
{patterns}

PRONÓSTICO (próximos 3 meses):
{forecast}

PRESUPUESTOS ACTUALES:
{budgets}

METAS FINANCIERAS:
{goals}

BALANCE ACTUAL:
{accounts}

Genera un reporte ejecutivo con:
1. Resumen de salud financiera (0-100)
2. Top 3 insights clave
3. Top 3 recomendaciones accionables
4. Alertas urgentes (si las hay)

Formato JSON:
{{
  "health_score": <número>,
  "insights": ["<insight1>", "<insight2>", "<insight3>"],
  "recommendations": ["<rec1>", "<rec2>", "<rec3>"],
  "alerts": ["<alerta1>", ...]
}}
"#,
        patterns = format_patterns(ctx.patterns),
        forecast = format_forecast(ctx.forecast),
        budgets = format_budgets(ctx.budgets),
        goals = format_goals(ctx.goals),
        accounts = format_accounts(ctx.accounts),
    )
}

pub fn spending_alert_prompt(
    anomalies: &[SpendingPattern],
    prediction_count: usize,
    budgets: &[Budget],
) -> String {
    format!(
        r#"Análisis de riesgo financiero:

PATRONES ANÓMALOS:
{anomalies}

ACTIVIDAD RECIENTE:
{prediction_count} transacciones en los últimos días.

PRESUPUESTOS:
{budgets}

¿Hay riesgos? Genera un mensaje de alerta breve y accionable (máx 200 caracteres).
Si no hay riesgo, responde "OK".
"#,
        anomalies = format_patterns(anomalies),
        budgets = format_budgets(budgets),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(amount: f64) -> Transaction {
        Transaction {
            amount,
            ..Transaction::default()
        }
    }

    #[test]
    fn test_avg_expense() {
        assert_eq!(calculate_avg_expense(&[]), 0.0);
        assert_eq!(calculate_avg_expense(&[tx(10.0), tx(25.0)]), 0.0);
        assert_eq!(calculate_avg_expense(&[tx(-50.0), tx(-30.0)]), 40.0);
        assert_eq!(calculate_avg_expense(&[tx(-50.0), tx(100.0), tx(-30.0)]), 40.0);
    }

    #[test]
    fn test_truncate_counts_characters() {
        let text = "á".repeat(300);
        let cut = truncate_chars(&text, 200);
        assert_eq!(cut.chars().count(), 200);
        assert_eq!(truncate_chars("corto", 200), "corto");
    }

    #[test]
    fn test_empty_formatters() {
        assert_eq!(format_patterns(&[]), "No hay patrones detectados.");
        assert_eq!(format_forecast(&[]), "No hay pronóstico disponible.");
        assert_eq!(format_budgets(&[]), "Sin presupuestos configurados.");
        assert_eq!(format_goals(&[]), "Sin metas configuradas.");
        assert_eq!(format_accounts(&[]), "Sin cuentas.");
    }

    #[test]
    fn test_budget_context_lists_at_most_ten_transactions() {
        let budgets = vec![Budget {
            category: "Alimentación".into(),
            limit_amount: 500.0,
            period_start: Some("2025-01-01".into()),
            period_end: Some("2025-01-31".into()),
            ..Budget::default()
        }];
        let transactions: Vec<Transaction> = (0..15).map(|i| tx(-(i as f64))).collect();

        let context = budget_context(&budgets, &transactions);
        assert!(context.contains("- Alimentación: límite 500 (2025-01-01 a 2025-01-31)"));
        let tx_lines = context
            .split("Transacciones recientes:")
            .nth(1)
            .unwrap()
            .lines()
            .filter(|l| l.starts_with("- "))
            .count();
        assert_eq!(tx_lines, 10);
    }

    #[test]
    fn test_goal_and_account_formatting() {
        let goals = vec![Goal {
            name: Some("Viaje".into()),
            target_amount: 1000.0,
            current_amount: 250.0,
            ..Goal::default()
        }];
        assert_eq!(format_goals(&goals), "- Viaje: 25% completado (meta: 1000)");

        let accounts = vec![
            Account { balance: 700.0, ..Account::default() },
            Account { balance: 300.0, ..Account::default() },
        ];
        assert_eq!(format_accounts(&accounts), "Balance total: 1000 en 2 cuenta(s).");
    }

    #[test]
    fn test_prompts_embed_inputs() {
        assert!(document_prompt("Total: 30 Bs.").contains("Total: 30 Bs."));
        assert!(categorization_prompt("Taxi", -30.0, "Otros", 0.456).contains("confianza: 0.46"));
        assert!(spending_alert_prompt(&[], 20, &[]).contains("20 transacciones"));
    }
}

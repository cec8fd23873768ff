//! Rule-based fallback agent
//!
//! Stands in for the language model and the OCR provider when they are not
//! configured or fail. Static keyword matching, no model involved.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::json;

use crate::agent::outcome::{monthly_amount, BudgetAuditOutcome, SavingsPlanOutcome};
use crate::gemini::LanguageModel;
use crate::models::{ChatMessage, ModelResponse, OcrResult};
use crate::ocr::OcrProvider;
use crate::Result;

/// Keyword buckets, checked in order; the first hit wins.
const KEYWORD_REPLIES: &[(&[&str], &str)] = &[
    (
        &["hola", "buenos", "saludos"],
        "¡Hola! 👋 Soy tu asistente financiero FinWise. Estoy aquí para ayudarte a gestionar mejor tu dinero. ¿En qué puedo ayudarte hoy?",
    ),
    (
        &["ahorro", "ahorrar", "guardar"],
        "Para mejorar tus ahorros, te recomiendo: 1) Establece una meta clara, 2) Automatiza transferencias mensuales, 3) Reduce gastos innecesarios. ¿Quieres que genere un plan de ahorro personalizado?",
    ),
    (
        &["gasto", "gastos", "gastando"],
        "He revisado tus gastos recientes. Las categorías con mayor impacto son: Alimentación y Entretenimiento. Te sugiero establecer presupuestos para estas categorías y usar la función de alertas automáticas.",
    ),
    (
        &["presupuesto", "budget"],
        "Los presupuestos son clave para el control financiero. Te recomiendo: 1) Crear presupuestos por categoría, 2) Revisarlos semanalmente, 3) Ajustarlos según tus necesidades. ¿Quieres que ejecute una auditoría de tus presupuestos actuales?",
    ),
    (
        &["meta", "objetivo", "goal"],
        "Establecer metas financieras es excelente. Para metas efectivas: 1) Hazlas específicas y medibles, 2) Establece plazos realistas, 3) Divide metas grandes en pasos pequeños. ¿Qué meta tienes en mente?",
    ),
    (
        &["inversión", "invertir", "investment"],
        "Para inversiones, considera: 1) Tu perfil de riesgo, 2) Diversificación, 3) Horizonte temporal. Recuerda que toda inversión conlleva riesgos. Consulta con un asesor financiero profesional.",
    ),
    (
        &["deuda", "deber", "préstamo"],
        "Para manejar deudas efectivamente: 1) Lista todas tus deudas, 2) Prioriza las de mayor interés, 3) Considera consolidación si es viable. ¿Necesitas ayuda para crear un plan de pago?",
    ),
    (
        &["ingreso", "ingresos", "salario"],
        "Para optimizar tus ingresos: 1) Registra todas las fuentes, 2) Busca oportunidades de ingresos adicionales, 3) Invierte en tu desarrollo profesional. El crecimiento de ingresos es tan importante como controlar gastos.",
    ),
];

const GENERIC_REPLIES: &[&str] = &[
    "Entiendo tu consulta. Basándome en tus datos financieros, te recomiendo revisar tus gastos en la categoría de entretenimiento.",
    "Excelente pregunta. Para mejorar tus finanzas, considera establecer un presupuesto mensual y seguirlo de cerca.",
    "He analizado tu situación. Tu balance actual es positivo, pero podrías ahorrar más reduciendo gastos innecesarios.",
    "Según tus patrones de gasto, te sugiero crear una meta de ahorro automática del 10% de tus ingresos mensuales.",
    "Perfecto. Veo que has sido consistente con tus presupuestos. Continúa así y alcanzarás tus metas financieras.",
    "Interesante. Para optimizar tus finanzas, te recomiendo usar la función de categorización automática de gastos.",
    "Basándome en tu historial, tu mayor gasto es en alimentación. Considera preparar más comidas en casa para ahorrar.",
    "Excelente progreso. Has reducido tus gastos un 15% este mes comparado con el anterior. ¡Sigue así!",
];

const FINANCIAL_TIPS: &[&str] = &[
    "💡 Tip: Revisa tus suscripciones mensuales, muchas veces pagamos por servicios que no usamos.",
    "📊 Consejo: Establece un fondo de emergencia equivalente a 3-6 meses de gastos.",
    "💰 Recomendación: Automatiza tus ahorros para que se descuenten automáticamente cada mes.",
    "🎯 Meta: Intenta ahorrar al menos el 20% de tus ingresos mensuales.",
];

const SAMPLE_RECEIPT: &str = "SUPERMERCADO LA FAVORITA\nFecha: 09/11/2025\nTotal: $45.50\nIVA: $5.46\nProductos: Frutas, Verduras, Lácteos";

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackAgent;

impl FallbackAgent {
    pub fn new() -> Self {
        Self
    }

    /// Canned reply for the latest message, if a keyword bucket matches.
    pub fn keyword_reply(message: &str) -> Option<&'static str> {
        let lowered = message.to_lowercase();
        KEYWORD_REPLIES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(_, reply)| *reply)
    }

    pub fn reply_to(message: &str) -> String {
        if let Some(reply) = Self::keyword_reply(message) {
            return reply.to_string();
        }

        let mut rng = rand::thread_rng();
        let reply = GENERIC_REPLIES.choose(&mut rng).copied().unwrap_or_default();
        let tip = FINANCIAL_TIPS.choose(&mut rng).copied().unwrap_or_default();
        format!("{}\n\n{}", reply, tip)
    }

    /// Reply to the latest message of a conversation.
    pub fn answer(&self, messages: &[ChatMessage]) -> ModelResponse {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        ModelResponse::from_text(&Self::reply_to(last))
    }

    pub fn receipt() -> OcrResult {
        let raw = json!({
            "text": SAMPLE_RECEIPT,
            "confidence": 0.95,
            "amount": 45.50,
            "merchant": "Supermercado La Favorita",
            "date": "2025-11-09",
        });

        OcrResult {
            text: SAMPLE_RECEIPT.to_string(),
            confidence: Some(0.95),
            raw,
        }
    }

    pub fn analyze_budget(&self, _user_id: &str) -> BudgetAuditOutcome {
        BudgetAuditOutcome::Completed {
            analysis: "He revisado tus presupuestos. Tienes 3 presupuestos activos. El de 'Alimentación' está al 85% de su límite. Te recomiendo ajustar tus gastos en esta categoría para no exceder el presupuesto.".to_string(),
            budgets_reviewed: 3,
            notification: None,
        }
    }

    pub fn generate_savings_plan(&self, target: f64, months: u32) -> SavingsPlanOutcome {
        let monthly = monthly_amount(target, months);

        let plan = format!(
            "📊 Plan de Ahorro Personalizado

🎯 Meta: ${target} USD
⏰ Plazo: {months} meses
💰 Ahorro mensual requerido: ${monthly} USD

📋 Estrategia recomendada:

1. Ahorro Automático:
   - Configura transferencia automática de ${monthly} al inicio de cada mes
   - Usa una cuenta de ahorros separada

2. Reducción de Gastos:
   - Identifica gastos no esenciales (${non_essential} USD)
   - Reduce salidas a restaurantes (${dining} USD)
   - Optimiza suscripciones (${subscriptions} USD)

3. Incremento de Ingresos:
   - Busca ingresos adicionales (freelance, ventas)
   - Objetivo: ${extra_income} USD extra/mes

4. Monitoreo:
   - Revisa tu progreso semanalmente
   - Ajusta el plan según necesites
   - Usa las alertas automáticas de FinWise

🎉 Con disciplina y este plan, alcanzarás tu meta en {months} meses!",
            target = format_money(target),
            months = months,
            monthly = format_money(monthly),
            non_essential = format_money(monthly * 0.3),
            dining = format_money(monthly * 0.2),
            subscriptions = format_money(monthly * 0.1),
            extra_income = format_money(monthly * 0.4),
        );

        SavingsPlanOutcome::Success {
            plan,
            target,
            months,
            monthly_amount: monthly,
            notification: None,
        }
    }
}

#[async_trait]
impl LanguageModel for FallbackAgent {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ModelResponse> {
        Ok(self.answer(messages))
    }
}

#[async_trait]
impl OcrProvider for FallbackAgent {
    async fn extract_text(&self, _document_url: &str) -> Result<OcrResult> {
        Ok(Self::receipt())
    }
}

/// Two decimals with comma thousands separators, e.g. `12,345.60`.
pub fn format_money(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_buckets() {
        assert!(FallbackAgent::keyword_reply("Hola, ¿cómo estás?")
            .unwrap()
            .starts_with("¡Hola!"));
        assert!(FallbackAgent::keyword_reply("Quiero AHORRAR más")
            .unwrap()
            .contains("mejorar tus ahorros"));
        assert!(FallbackAgent::keyword_reply("tengo una deuda")
            .unwrap()
            .contains("manejar deudas"));
        assert!(FallbackAgent::keyword_reply("xyz").is_none());
    }

    #[test]
    fn test_buckets_are_checked_in_order() {
        // greeting precedes savings
        let reply = FallbackAgent::keyword_reply("hola, quiero ahorrar").unwrap();
        assert!(reply.starts_with("¡Hola!"));
    }

    #[test]
    fn test_generic_reply_appends_a_tip() {
        let reply = FallbackAgent::reply_to("xyz");
        let (body, tip) = reply.split_once("\n\n").unwrap();
        assert!(GENERIC_REPLIES.contains(&body));
        assert!(FINANCIAL_TIPS.contains(&tip));
    }

    #[tokio::test]
    async fn test_chat_uses_latest_message() {
        let agent = FallbackAgent::new();
        let response = agent
            .chat(&[ChatMessage::user("hola"), ChatMessage::user("mis gastos")])
            .await
            .unwrap();
        assert!(response.text().starts_with("He revisado tus gastos"));
    }

    #[tokio::test]
    async fn test_receipt() {
        let result = FallbackAgent::new()
            .extract_text("https://example.com/r.png")
            .await
            .unwrap();
        assert!(result.text.contains("Total: $45.50"));
        assert_eq!(result.confidence, Some(0.95));
    }

    #[test]
    fn test_savings_plan_zero_months() {
        let SavingsPlanOutcome::Success {
            plan,
            monthly_amount,
            ..
        } = FallbackAgent::new().generate_savings_plan(1000.0, 0);
        assert_eq!(monthly_amount, 0.0);
        assert!(plan.contains("Ahorro mensual requerido: $0.00 USD"));
    }

    #[test]
    fn test_savings_plan_buckets() {
        let SavingsPlanOutcome::Success { plan, .. } =
            FallbackAgent::new().generate_savings_plan(12000.0, 12);
        assert!(plan.contains("Meta: $12,000.00 USD"));
        assert!(plan.contains("gastos no esenciales ($300.00 USD)"));
        assert!(plan.contains("Objetivo: $400.00 USD extra/mes"));
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(999.5), "999.50");
        assert_eq!(format_money(1234567.891), "1,234,567.89");
        assert_eq!(format_money(-1500.0), "-1,500.00");
    }
}

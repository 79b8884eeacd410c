//! The digital and scanned extraction pipelines.
//!
//! A pipeline is one [`RuleChain`] per field, evaluated in dependency order
//! so numeric exclusions always compare against authoritative prior values.
//! The barcode is decoded first, document-wide.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use tracing::{trace, warn};

use crate::error::ExtractionError;
use crate::extract::amount;
use crate::extract::assembler::RecordBuilder;
use crate::extract::barcode::{decode_barcode, Barcode};
use crate::extract::catalog::{CompiledCatalog, CompiledPattern};
use crate::extract::client::client_cleaner;
use crate::extract::dates::{canonical_date, find_dates};
use crate::extract::disambiguate::{collides, nearest_to_anchor, Candidate, Resolved};
use crate::extract::rules::{FieldContext, Rule, RuleChain};
use crate::models::record::{ExtractionMode, Field, FieldKind, FieldValue};

lazy_static! {
    static ref STREET: Regex = Regex::new(
        r"(?im)^\s*((?:KR|CRA|CL|CALLE|AV|AVENIDA|CARRERA|DG|DIAGONAL|TV|TRANSVERSAL)\.?\s*\d{1,3}[^\n]{0,150})"
    ).unwrap();

    static ref STREET_STOP: Regex = RegexBuilder::new(r"\s*(?:FAX|Tel\b|PBX|L[íi]nea|Valor|Tipo)")
        .case_insensitive(true)
        .build()
        .unwrap();

    static ref SOLICITUD_LINE: Regex = RegexBuilder::new(r"\bSolicit(?:ud|ion)\b")
        .case_insensitive(true)
        .build()
        .unwrap();

    static ref SOLICITUD_ANCHOR: Regex = RegexBuilder::new(r"Solicitud")
        .case_insensitive(true)
        .build()
        .unwrap();

    static ref LONG_NUMBER: Regex = Regex::new(r"\d{5,}").unwrap();
}

/// Fields in resolution order. Barcode fields are set before the chains run.
pub const RESOLUTION_ORDER: [Field; 9] = [
    Field::Contract,
    Field::Identification,
    Field::PaymentReferenceNumber,
    Field::RequestNumber,
    Field::Client,
    Field::Address,
    Field::CouponType,
    Field::ValidUntil,
    Field::AmountDue,
];

/// Rule name for a barcode found by line structure.
const BARCODE_LINE_RULE: &str = "barcode.line";

/// Format of a valid-until date taken from barcode AI 96.
const AI_DUE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Coupon key lines and the field their next line holds.
const COUPON_KEYS: [(&str, Field); 24] = [
    ("NOMBRE", Field::Client),
    ("NOMBRE COMPLETO", Field::Client),
    ("CLIENTE", Field::Client),
    ("IDENTIFICACIÓN", Field::Identification),
    ("IDENTIFICACION", Field::Identification),
    ("ID", Field::Identification),
    ("CÉDULA", Field::Identification),
    ("CEDULA", Field::Identification),
    ("DIRECCIÓN", Field::Address),
    ("DIRECCION", Field::Address),
    ("DIR", Field::Address),
    ("CONTRATO", Field::Contract),
    ("NO. CONTRATO", Field::Contract),
    ("SOLICITUD", Field::RequestNumber),
    ("NO. SOLICITUD", Field::RequestNumber),
    ("REL. PAGO", Field::PaymentReferenceNumber),
    ("NO. REL. PAGO", Field::PaymentReferenceNumber),
    ("NO. REF. PAGO", Field::PaymentReferenceNumber),
    ("TIPO DE CUPÓN", Field::CouponType),
    ("TIPO DE CUPON", Field::CouponType),
    ("VÁLIDO HASTA", Field::ValidUntil),
    ("VALIDO HASTA", Field::ValidUntil),
    ("VALOR A PAGAR", Field::AmountDue),
    ("VALOR", Field::AmountDue),
];

/// One extraction pipeline.
#[derive(Debug)]
pub struct Pipeline {
    mode: ExtractionMode,
    chains: Vec<(Field, RuleChain)>,
    barcode_patterns: Vec<CompiledPattern>,
}

impl Pipeline {
    /// Pipeline for clean, selectable text.
    pub fn digital(catalog: &CompiledCatalog) -> Self {
        let mode = ExtractionMode::Digital;
        let p = move |field| catalog.patterns(mode, field);

        let chains = RESOLUTION_ORDER
            .iter()
            .map(|&field| {
                let chain = match field {
                    Field::PaymentReferenceNumber => RuleChain::new()
                        .then_patterns(p(field), None)
                        .then(Rule::heuristic("barcode.ai8020", barcode_payment_reference))
                        .then(Rule::heuristic("coupon.scan", coupon_scan)),
                    Field::Client => RuleChain::new()
                        .then_patterns(p(field), None)
                        .then(Rule::heuristic("client.cleaner", client_cleaner))
                        .then(Rule::heuristic("coupon.scan", coupon_scan)),
                    Field::ValidUntil => RuleChain::new()
                        .then_patterns(p(field), Some(refine_date))
                        .then(Rule::heuristic("coupon.scan", coupon_scan))
                        .then(Rule::heuristic("date.shape", date_shape))
                        .then(Rule::heuristic("barcode.ai96", barcode_due_date)),
                    Field::RequestNumber => RuleChain::new()
                        .then_patterns(p(field), None)
                        .then(Rule::heuristic("request.same_line", request_same_line))
                        .then(Rule::heuristic("coupon.scan", coupon_scan)),
                    Field::AmountDue => amount_chain(p(field)),
                    _ => RuleChain::new()
                        .then_patterns(p(field), None)
                        .then(Rule::heuristic("coupon.scan", coupon_scan)),
                };
                (field, chain)
            })
            .collect();

        Self {
            mode,
            chains,
            barcode_patterns: p(Field::BarcodeRaw).to_vec(),
        }
    }

    /// Pipeline for noisy OCR output.
    pub fn scanned(catalog: &CompiledCatalog) -> Self {
        let mode = ExtractionMode::Scanned;
        let p = move |field| catalog.patterns(mode, field);

        let chains = RESOLUTION_ORDER
            .iter()
            .map(|&field| {
                let chain = match field {
                    Field::Client => RuleChain::new()
                        .then(Rule::heuristic("client.cleaner", client_cleaner))
                        .then_patterns(p(field), None),
                    Field::Address => RuleChain::new()
                        .then_patterns(p(field), None)
                        .then(Rule::heuristic("address.street", street_address)),
                    Field::RequestNumber => RuleChain::new()
                        .then_patterns(p(field), None)
                        .then(Rule::heuristic("request.same_line", request_same_line))
                        .then(Rule::heuristic("request.nearest", request_nearest)),
                    Field::PaymentReferenceNumber => RuleChain::new()
                        .then_patterns(p(field), None)
                        .then(Rule::heuristic("barcode.ai8020", barcode_payment_reference)),
                    Field::ValidUntil => RuleChain::new()
                        .then_patterns(p(field), Some(refine_date))
                        .then(Rule::heuristic("date.shape", date_shape))
                        .then(Rule::heuristic("barcode.ai96", barcode_due_date)),
                    Field::AmountDue => amount_chain(p(field)),
                    _ => RuleChain::new().then_patterns(p(field), None),
                };
                (field, chain)
            })
            .collect();

        Self {
            mode,
            chains,
            barcode_patterns: p(Field::BarcodeRaw).to_vec(),
        }
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// The chain that resolves a field.
    pub fn chain(&self, field: Field) -> Option<&RuleChain> {
        self.chains.iter().find(|(f, _)| *f == field).map(|(_, c)| c)
    }

    #[cfg(test)]
    pub(crate) fn chain_mut(&mut self, field: Field) -> Option<&mut RuleChain> {
        self.chains.iter_mut().find(|(f, _)| *f == field).map(|(_, c)| c)
    }

    /// Run every chain over normalized text.
    ///
    /// A failing chain is logged and noted; its field stays NOT_FOUND and
    /// the remaining fields are still resolved.
    pub fn run(&self, text: &str) -> RecordBuilder {
        let mut builder = RecordBuilder::new(self.mode);

        let barcode = self.locate_barcode(text);
        if let Some((barcode, rule)) = &barcode {
            builder.set(Field::BarcodeRaw, FieldValue::normalized(FieldKind::Raw, &barcode.raw), rule.as_str());
            builder.set(Field::BarcodeClean, FieldValue::normalized(FieldKind::Code, &barcode.clean), rule.as_str());
        }

        let mut resolved = Resolved::default();
        for (field, chain) in &self.chains {
            let ctx = FieldContext {
                field: *field,
                mode: self.mode,
                text,
                resolved: &resolved,
                barcode: barcode.as_ref().map(|(b, _)| b),
            };

            match chain.evaluate(&ctx) {
                Ok(Some(hit)) => {
                    resolved.insert(*field, hit.value.clone());
                    builder.set(*field, FieldValue::Found(hit.value), hit.rule);
                }
                Ok(None) => trace!("{} not found", field),
                Err(err) => {
                    warn!("Field extraction failed, leaving {} unresolved: {}", field, err);
                    builder.note_error(err.to_string());
                }
            }
        }

        builder
    }

    /// Structural barcode line first, then catalog barcode patterns.
    fn locate_barcode(&self, text: &str) -> Option<(Barcode, String)> {
        if let Some(barcode) = decode_barcode(text) {
            return Some((barcode, BARCODE_LINE_RULE.to_string()));
        }

        self.barcode_patterns.iter().find_map(|pattern| {
            pattern
                .located(text)
                .into_iter()
                .find_map(|(offset, raw)| Barcode::parse(raw, offset))
                .map(|barcode| (barcode, pattern.key().to_string()))
        })
    }
}

fn amount_chain(labelled: &[CompiledPattern]) -> RuleChain {
    RuleChain::new()
        .then(Rule::heuristic("amount.currency", amount::currency_stage))
        .then_patterns(labelled, Some(amount::labelled_region))
        .then(Rule::heuristic("amount.total", amount::total_window_stage))
        .then(Rule::heuristic("barcode.ai3900", amount::barcode_stage))
        .then(Rule::heuristic("amount.last_resort", amount::last_resort_stage))
}

fn refine_date(raw: &str, _ctx: &FieldContext<'_>) -> Option<String> {
    canonical_date(raw)
}

/// Label/value pairs where the label sits alone on its line.
///
/// The first value seen for a field wins.
pub fn coupon_pairs(text: &str) -> BTreeMap<Field, String> {
    let mut pairs = BTreeMap::new();
    let mut pending: Option<Field> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(field) = coupon_key(line) {
            pending = Some(field);
            continue;
        }
        if let Some(field) = pending.take() {
            pairs.entry(field).or_insert_with(|| line.to_string());
        }
    }
    pairs
}

fn coupon_key(line: &str) -> Option<Field> {
    let key = line.trim_end_matches(':').trim_end().to_uppercase();
    COUPON_KEYS
        .iter()
        .find(|(label, _)| *label == key)
        .map(|(_, field)| *field)
}

/// Heuristic: value line under a bare key line.
fn coupon_scan(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    let pairs = coupon_pairs(ctx.text);
    let Some(value) = pairs.get(&ctx.field) else {
        return Ok(None);
    };
    let value = match ctx.field {
        Field::ValidUntil => canonical_date(value).unwrap_or_else(|| value.clone()),
        Field::AmountDue => amount::normalize_amount(value).as_deref().unwrap_or_default().to_string(),
        _ => value.clone(),
    };
    Ok(ctx.accept(&value))
}

fn barcode_payment_reference(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    Ok(ctx
        .barcode
        .and_then(Barcode::payment_reference)
        .and_then(|v| ctx.accept(&v)))
}

fn barcode_due_date(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    Ok(ctx
        .barcode
        .and_then(Barcode::due_date)
        .map(|d| d.format(AI_DUE_DATE_FORMAT).to_string())
        .and_then(|v| ctx.normalize(&v)))
}

/// Heuristic: first valid date anywhere in the document.
fn date_shape(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    Ok(find_dates(ctx.text)
        .into_iter()
        .next()
        .and_then(|d| ctx.normalize(&d.text)))
}

/// Heuristic: a line that starts like a street address.
fn street_address(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    for caps in STREET.captures_iter(ctx.text) {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if whole.to_lowercase().contains("cliente") {
            continue;
        }
        let Some(value) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let value = match STREET_STOP.find(value) {
            Some(stop) => &value[..stop.start()],
            None => value,
        };
        if let Some(value) = ctx.accept(value) {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Heuristic: first long number on a line that mentions the request label.
fn request_same_line(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    for line in ctx.text.lines().filter(|l| SOLICITUD_LINE.is_match(l)) {
        if let Some(value) = LONG_NUMBER
            .find_iter(line)
            .find_map(|m| ctx.accept(m.as_str()))
        {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Heuristic: the non-excluded long number nearest to the request label.
fn request_nearest(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    let Some(anchor) = SOLICITUD_ANCHOR.find(ctx.text) else {
        return Ok(None);
    };

    let candidates: Vec<Candidate> = LONG_NUMBER
        .find_iter(ctx.text)
        .filter(|m| collides(ctx.resolved, ctx.field, m.as_str()).is_none())
        .map(|m| Candidate {
            value: m.as_str().to_string(),
            start: m.start(),
        })
        .collect();

    Ok(nearest_to_anchor(&candidates, anchor.start()).and_then(|c| ctx.accept(&c.value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::catalog::PatternCatalog;
    use pretty_assertions::assert_eq;

    fn catalog() -> CompiledCatalog {
        PatternCatalog::default().compile().unwrap()
    }

    fn run(pipeline: &Pipeline, text: &str) -> crate::models::record::ExtractedRecord {
        pipeline.run(text).assemble("test.pdf")
    }

    fn value(record: &crate::models::record::ExtractedRecord, field: Field) -> Option<&str> {
        record.get(field).as_deref()
    }

    const DIGITAL_COUPON: &str = "\
Cupón de pago
Cliente: MARTHA LUCIA RINCON Identificación: 52123456
Contrato: 4455667 No. Solicitud: 8899001
Dir. Cliente: CALLE 45 # 12-30 FAX: 6015551234
Tipo de Cupón: CF Válido hasta: 15-ene-2025
Valor a pagar: $135.400,00
No. Ref. Pago: 7700112233
(415)7709998012345(8020)0007700112233(3900)0135400(96)20250115";

    #[test]
    fn test_digital_coupon() {
        let record = run(&Pipeline::digital(&catalog()), DIGITAL_COUPON);

        assert_eq!(value(&record, Field::Client), Some("MARTHA LUCIA RINCON"));
        assert_eq!(value(&record, Field::Identification), Some("52123456"));
        assert_eq!(value(&record, Field::Contract), Some("4455667"));
        assert_eq!(value(&record, Field::RequestNumber), Some("8899001"));
        assert_eq!(value(&record, Field::Address), Some("CALLE 45 # 12-30"));
        assert_eq!(value(&record, Field::CouponType), Some("CF"));
        assert_eq!(value(&record, Field::ValidUntil), Some("15-ENE-2025"));
        assert_eq!(value(&record, Field::AmountDue), Some("135400"));
        assert_eq!(value(&record, Field::PaymentReferenceNumber), Some("7700112233"));
        assert_eq!(
            value(&record, Field::BarcodeClean),
            Some("415770999801234580200007700112233390001354009620250115")
        );
        assert_eq!(record.provenance(Field::AmountDue), Some("amount.currency"));
        assert_eq!(record.provenance(Field::BarcodeRaw), Some("barcode.line"));
    }

    #[test]
    fn test_order_puts_contract_before_request() {
        let positions: Vec<usize> = [
            Field::Contract,
            Field::Identification,
            Field::PaymentReferenceNumber,
            Field::RequestNumber,
        ]
        .iter()
        .map(|f| RESOLUTION_ORDER.iter().position(|o| o == f).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_request_number_excludes_contract() {
        // The tolerant pattern only sees the contract number.
        let text = "Contrato: 4455667\nSolicitud ref 4455667 y 8899001";
        let record = run(&Pipeline::digital(&catalog()), text);
        assert_eq!(value(&record, Field::Contract), Some("4455667"));
        assert_eq!(value(&record, Field::RequestNumber), Some("8899001"));
        assert_eq!(record.provenance(Field::RequestNumber), Some("request.same_line"));
    }

    #[test]
    fn test_scanned_request_same_line_then_nearest() {
        let mut resolved = Resolved::default();
        resolved.insert(Field::Contract, "4455667");
        let ctx = FieldContext {
            field: Field::RequestNumber,
            mode: ExtractionMode::Scanned,
            text: "Solicitud 4455667 8899001 fax 6015551234",
            resolved: &resolved,
            barcode: None,
        };
        assert_eq!(request_same_line(&ctx).unwrap(), Some("8899001".to_string()));

        let text = "1111111 Contrato 4455667\nSolicitud\n2222222 otra 3333333";
        let ctx = FieldContext { text, ..ctx };
        assert_eq!(request_same_line(&ctx).unwrap(), None);
        assert_eq!(request_nearest(&ctx).unwrap(), Some("2222222".to_string()));
    }

    #[test]
    fn test_coupon_scan_pairs() {
        let text = "NOMBRE:\nANA MARIA TORRES\nCÉDULA\n1.020.304\nDirección\nKR 7 # 8-9\nVALOR A PAGAR\n$ 45.000\nNOMBRE\nOTRO";
        let pairs = coupon_pairs(text);
        assert_eq!(pairs.get(&Field::Client).map(String::as_str), Some("ANA MARIA TORRES"));
        assert_eq!(pairs.get(&Field::Identification).map(String::as_str), Some("1.020.304"));
        assert_eq!(pairs.get(&Field::Address).map(String::as_str), Some("KR 7 # 8-9"));
        assert_eq!(pairs.get(&Field::AmountDue).map(String::as_str), Some("$ 45.000"));

        let record = run(&Pipeline::digital(&catalog()), text);
        assert_eq!(value(&record, Field::Client), Some("ANA MARIA TORRES"));
        assert_eq!(record.provenance(Field::Client), Some("coupon.scan"));
        assert_eq!(value(&record, Field::Identification), Some("1020304"));
        assert_eq!(value(&record, Field::AmountDue), Some("45000"));
    }

    #[test]
    fn test_scanned_coupon() {
        let text = "\
Cliente: JORGE
ELIECER PATIÑO 3104445566
Identificacion: 80.123.456
Contrato 4455667
No Solicitud 8899001
KR 15 No 20-30 FAX 555
Valor a pagar $ 2O.OOO
Valido hasta 03-0CT-2024";
        let record = run(&Pipeline::scanned(&catalog()), text);

        assert_eq!(value(&record, Field::Client), Some("JORGE ELIECER PATIÑO"));
        assert_eq!(value(&record, Field::Identification), Some("80123456"));
        assert_eq!(value(&record, Field::Contract), Some("4455667"));
        assert_eq!(value(&record, Field::RequestNumber), Some("8899001"));
        assert_eq!(value(&record, Field::Address), Some("KR 15 NO 20-30"));
        assert_eq!(value(&record, Field::AmountDue), Some("20000"));
        assert_eq!(value(&record, Field::ValidUntil), Some("03-OCT-2024"));
        assert_eq!(record.provenance(Field::Address), Some("address.street"));
    }

    #[test]
    fn test_barcode_ai_fallbacks() {
        let text = "(415)7709998012345(8020)0001234567(3900)0075000(96)20250115";
        let record = run(&Pipeline::scanned(&catalog()), text);
        assert_eq!(value(&record, Field::AmountDue), Some("75000"));
        assert_eq!(value(&record, Field::PaymentReferenceNumber), Some("1234567"));
        assert_eq!(value(&record, Field::ValidUntil), Some("15/01/2025"));
        assert_eq!(record.provenance(Field::ValidUntil), Some("barcode.ai96"));
    }

    #[test]
    fn test_embedded_barcode_pattern() {
        let text = "Ref (415)7709998(8020)123456789(3900)55000(96)20250131 pago";
        let record = run(&Pipeline::digital(&catalog()), text);
        assert_eq!(
            value(&record, Field::BarcodeRaw),
            Some("(415)7709998(8020)123456789(3900)55000(96)20250131")
        );
        assert_eq!(record.provenance(Field::BarcodeRaw), Some("digital.CodigoBarraRaw[0]"));
        assert_eq!(value(&record, Field::AmountDue), Some("55000"));
    }

    #[test]
    fn test_failing_rule_is_recovered() {
        fn failing(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
            Err(ExtractionError::Field {
                field: ctx.field,
                reason: "rule crashed".to_string(),
            })
        }

        let mut pipeline = Pipeline::digital(&catalog());
        let chain = pipeline.chain_mut(Field::Contract).unwrap();
        *chain = RuleChain::new().then(Rule::heuristic("failing", failing));

        let record = run(&pipeline, "Contrato: 998877\nValor a pagar: $20.000");
        assert_eq!(record.get(Field::Contract), &FieldValue::NotFound);
        assert_eq!(value(&record, Field::AmountDue), Some("20000"));
        assert_eq!(record.error(), Some("Contrato: rule crashed"));
    }
}

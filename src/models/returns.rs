// src/models/returns.rs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{common::error::AppError, models::purchases::PurchaseLineSnapshot};

// --- 1. Status da Devolução ---
// Draft -> Final -> Void, e nada além disso. Final é registro de auditoria:
// correção se faz com void + nova devolução, nunca editando o histórico.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "purchase_return_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReturnStatus {
    Draft,
    Final,
    Void,
}

// --- 2. Embalagem (resumo desnormalizado) ---
// Quantas caixas, peças avulsas e metragem total compõem uma quantidade.
// Não é um contêiner de itens: é só o resumo físico.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackingBreakdown {
    pub boxes: Decimal,
    pub pieces: Decimal,
    pub length_units: Decimal,
}

impl PackingBreakdown {
    /// Rateia a embalagem original para a quantidade devolvida.
    ///
    /// Cada campo é escalado de forma independente por
    /// `return_qty / original_qty` e arredondado a 2 casas (meio para cima).
    /// Os campos NÃO são reconciliados entre si depois do arredondamento;
    /// a folga de até 0,01 por campo é aceita.
    pub fn allocate(
        &self,
        original_qty: Decimal,
        return_qty: Decimal,
    ) -> Result<PackingBreakdown, AppError> {
        if original_qty <= Decimal::ZERO {
            return Err(AppError::DivisionUndefined);
        }
        let ratio = return_qty / original_qty;
        let scale = |value: Decimal| {
            (value * ratio).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        Ok(PackingBreakdown {
            boxes: scale(self.boxes),
            pieces: scale(self.pieces),
            length_units: scale(self.length_units),
        })
    }

    /// Variação inteira de caixas/peças para o histórico de estoque,
    /// escalada do valor bruto e arredondada uma única vez. Arredondar em
    /// cima dos campos já rateados a 2 casas divergiria nos meios-pontos
    /// (4.99 × 0.5 = 2.495 → 2.50 → 3, em vez de 2).
    pub fn whole_box_piece_change(
        &self,
        original_qty: Decimal,
        return_qty: Decimal,
    ) -> Result<(Decimal, Decimal), AppError> {
        if original_qty <= Decimal::ZERO {
            return Err(AppError::DivisionUndefined);
        }
        let ratio = return_qty / original_qty;
        let whole = |value: Decimal| {
            (value * ratio).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        };
        Ok((whole(self.boxes), whole(self.pieces)))
    }

    /// Remonta a embalagem a partir das colunas planas do banco.
    pub fn from_columns(
        boxes: Option<Decimal>,
        pieces: Option<Decimal>,
        meters: Option<Decimal>,
    ) -> Option<PackingBreakdown> {
        if boxes.is_none() && pieces.is_none() && meters.is_none() {
            return None;
        }
        Some(PackingBreakdown {
            boxes: boxes.unwrap_or(Decimal::ZERO),
            pieces: pieces.unwrap_or(Decimal::ZERO),
            length_units: meters.unwrap_or(Decimal::ZERO),
        })
    }
}

// --- 3. Origem da linha ---
// Variante etiquetada em vez de campos opcionais soltos: o limite de
// quantidade só existe quando a linha aponta para um item de compra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReturnLineSource {
    Linked { purchase_item_id: Uuid },
    Standalone,
}

// --- 4. Linha de Devolução ---
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLine {
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub product_name: String,
    pub sku: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    /// Sempre `quantity * unit_price`; nunca gravado de forma independente.
    pub total: Decimal,
    pub notes: Option<String>,
    pub source: ReturnLineSource,
    pub packing: Option<PackingBreakdown>,
}

impl ReturnLine {
    pub fn purchase_item_id(&self) -> Option<Uuid> {
        match self.source {
            ReturnLineSource::Linked { purchase_item_id } => Some(purchase_item_id),
            ReturnLineSource::Standalone => None,
        }
    }
}

/// Monta uma linha a partir de um item da compra de origem.
///
/// Pedidos negativos/zero viram uma linha zerada (que o service descarta),
/// acompanhando a interação de ajuste com +/- da tela. Quando o item tem
/// embalagem, o rateio manda: a metragem rateada vira a quantidade da linha,
/// garantindo que quantidade e embalagem nunca divirjam.
///
/// O teto vem do `already_returned` do snapshot; linhas irmãs do mesmo
/// pedido entram nessa conta por quem monta o snapshot.
pub fn build_linked_line(
    snapshot: &PurchaseLineSnapshot,
    requested_qty: Decimal,
) -> Result<ReturnLine, AppError> {
    let requested = requested_qty.max(Decimal::ZERO);
    let max_returnable = snapshot.max_returnable();
    if requested > max_returnable {
        return Err(AppError::QuantityExceeded(format!(
            "{}: pedido {}, devolvível {}.",
            snapshot.product_name, requested, max_returnable
        )));
    }

    let mut quantity = requested;
    let packing = match &snapshot.packing {
        Some(original) if requested > Decimal::ZERO => {
            let allocated = original.allocate(snapshot.quantity, requested)?;
            if allocated.length_units > Decimal::ZERO {
                quantity = allocated.length_units;
            }
            Some(allocated)
        }
        _ => None,
    };

    Ok(ReturnLine {
        product_id: snapshot.product_id,
        variation_id: snapshot.variation_id,
        product_name: snapshot.product_name.clone(),
        sku: snapshot.sku.clone(),
        quantity,
        unit: snapshot.unit.clone(),
        unit_price: snapshot.unit_price,
        total: quantity * snapshot.unit_price,
        notes: None,
        source: ReturnLineSource::Linked {
            purchase_item_id: snapshot.id,
        },
        packing,
    })
}

/// Monta uma linha avulsa (sem nota de origem): não há teto de quantidade,
/// mas zero/negativo é erro porque aqui não existe a interação de ajuste.
#[allow(clippy::too_many_arguments)]
pub fn build_standalone_line(
    product_id: Uuid,
    variation_id: Option<Uuid>,
    product_name: &str,
    sku: &str,
    quantity: Decimal,
    unit: Option<&str>,
    unit_price: Decimal,
    packing: Option<PackingBreakdown>,
    notes: Option<&str>,
) -> Result<ReturnLine, AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::InvalidQuantity(format!(
            "{}: quantidade deve ser positiva.",
            product_name
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(AppError::InvalidQuantity(format!(
            "{}: preço unitário não pode ser negativo.",
            product_name
        )));
    }

    // Embalagem informada manda na quantidade, como no fluxo vinculado.
    let quantity = match &packing {
        Some(p) if p.length_units > Decimal::ZERO => p.length_units,
        _ => quantity,
    };

    Ok(ReturnLine {
        product_id,
        variation_id,
        product_name: product_name.to_string(),
        sku: sku.to_string(),
        quantity,
        unit: unit.map(str::to_string),
        unit_price,
        total: quantity * unit_price,
        notes: notes.map(str::to_string),
        source: ReturnLineSource::Standalone,
        packing,
    })
}

// --- 5. Agregado: a Devolução de Compra ---
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReturn {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    /// NULL = devolução avulsa. Imutável depois de criado.
    pub original_purchase_id: Option<Uuid>,
    pub return_no: Option<String>,
    pub return_date: NaiveDate,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: String,
    pub status: ReturnStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<ReturnLine>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseReturn {
    pub fn add_line(&mut self, line: ReturnLine) {
        self.lines.push(line);
        self.recompute_totals();
    }

    pub fn remove_line(&mut self, index: usize) -> Option<ReturnLine> {
        if index >= self.lines.len() {
            return None;
        }
        let removed = self.lines.remove(index);
        self.recompute_totals();
        Some(removed)
    }

    /// Idempotente; chamado após qualquer mutação de linha.
    /// Sem camada de imposto/desconto: subtotal e total coincidem.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.lines.iter().map(|l| l.total).sum();
        self.total = self.subtotal;
    }

    pub fn has_positive_line(&self) -> bool {
        self.lines.iter().any(|l| l.quantity > Decimal::ZERO)
    }

    /// Quantidade pedida por item de compra, somando linhas duplicadas:
    /// o teto devolvível vale para o conjunto, não por linha.
    pub fn linked_quantities(&self) -> BTreeMap<Uuid, Decimal> {
        let mut totals = BTreeMap::new();
        for line in &self.lines {
            if line.quantity <= Decimal::ZERO {
                continue;
            }
            if let Some(purchase_item_id) = line.purchase_item_id() {
                *totals.entry(purchase_item_id).or_insert(Decimal::ZERO) += line.quantity;
            }
        }
        totals
    }

    /// Pronta para ser gravada como rascunho: ainda em Draft, com
    /// fornecedor identificado e ao menos uma linha positiva.
    pub fn is_submittable(&self) -> bool {
        self.status == ReturnStatus::Draft
            && !self.supplier_name.trim().is_empty()
            && self.has_positive_line()
    }

    // --- Guardas da máquina de estados ---

    pub fn ensure_can_finalize(&self) -> Result<(), AppError> {
        if self.status != ReturnStatus::Draft {
            return Err(AppError::IllegalStateTransition(format!(
                "Só rascunhos podem ser finalizados (status atual: {:?}).",
                self.status
            )));
        }
        if !self.has_positive_line() {
            return Err(AppError::MissingRequiredField(
                "A devolução precisa de ao menos uma linha com quantidade positiva.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ensure_can_void(&self) -> Result<(), AppError> {
        if self.status != ReturnStatus::Final {
            return Err(AppError::IllegalStateTransition(format!(
                "Só devoluções finalizadas podem ser anuladas (status atual: {:?}).",
                self.status
            )));
        }
        Ok(())
    }

    pub fn ensure_can_delete(&self) -> Result<(), AppError> {
        if self.status != ReturnStatus::Draft {
            return Err(AppError::IllegalStateTransition(
                "Devolução finalizada/anulada não pode ser excluída; ela é registro de auditoria."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// --- 6. Eventos do ciclo de vida ---
// Valor de retorno explícito do controller; quem chama decide o que
// atualizar (nada de broadcast implícito).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReturnEvent {
    ReturnFinalized { return_id: Uuid, total: Decimal },
    ReturnVoided { return_id: Uuid, total: Decimal },
}

// --- 7. Linhas do banco ---

#[derive(Debug, Clone, FromRow)]
pub struct PurchaseReturnRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub original_purchase_id: Option<Uuid>,
    pub return_no: Option<String>,
    pub return_date: NaiveDate,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: String,
    pub status: ReturnStatus,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseReturnRow {
    pub fn into_aggregate(self, lines: Vec<ReturnLine>) -> PurchaseReturn {
        PurchaseReturn {
            id: self.id,
            company_id: self.company_id,
            branch_id: self.branch_id,
            original_purchase_id: self.original_purchase_id,
            return_no: self.return_no,
            return_date: self.return_date,
            supplier_id: self.supplier_id,
            supplier_name: self.supplier_name,
            status: self.status,
            reason: self.reason,
            notes: self.notes,
            lines,
            subtotal: self.subtotal,
            total: self.total,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ReturnItemRow {
    pub id: Uuid,
    pub purchase_return_id: Uuid,
    pub purchase_item_id: Option<Uuid>,
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub product_name: String,
    pub sku: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub packing_boxes: Option<Decimal>,
    pub packing_pieces: Option<Decimal>,
    pub packing_meters: Option<Decimal>,
}

impl ReturnItemRow {
    pub fn into_line(self) -> ReturnLine {
        let source = match self.purchase_item_id {
            Some(purchase_item_id) => ReturnLineSource::Linked { purchase_item_id },
            None => ReturnLineSource::Standalone,
        };
        ReturnLine {
            product_id: self.product_id,
            variation_id: self.variation_id,
            product_name: self.product_name,
            sku: self.sku,
            quantity: self.quantity,
            unit: self.unit,
            unit_price: self.unit_price,
            total: self.total,
            notes: self.notes,
            source,
            packing: PackingBreakdown::from_columns(
                self.packing_boxes,
                self.packing_pieces,
                self.packing_meters,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn snapshot_with_packing() -> PurchaseLineSnapshot {
        // Linha de compra de 50 unidades: 5 caixas, 50 metros.
        PurchaseLineSnapshot {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variation_id: None,
            product_name: "Tecido Jacquard".to_string(),
            sku: "TEC-001".to_string(),
            quantity: d("50"),
            unit: Some("m".to_string()),
            unit_price: d("120.00"),
            total: d("6000.00"),
            packing: Some(PackingBreakdown {
                boxes: d("5"),
                pieces: d("0"),
                length_units: d("50"),
            }),
            already_returned: Decimal::ZERO,
        }
    }

    fn draft_return(lines: Vec<ReturnLine>) -> PurchaseReturn {
        let now = Utc::now();
        let mut ret = PurchaseReturn {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            original_purchase_id: None,
            return_no: None,
            return_date: now.date_naive(),
            supplier_id: Some(Uuid::new_v4()),
            supplier_name: "Fornecedor Têxtil".to_string(),
            status: ReturnStatus::Draft,
            reason: None,
            notes: None,
            lines,
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        ret.recompute_totals();
        ret
    }

    fn standalone_line(quantity: &str, unit_price: &str) -> ReturnLine {
        build_standalone_line(
            Uuid::new_v4(),
            None,
            "Botão Madrepérola",
            "BOT-010",
            d(quantity),
            Some("pcs"),
            d(unit_price),
            None,
            None,
        )
        .unwrap()
    }

    // --- Rateio de embalagem ---

    #[test]
    fn allocate_scales_each_field_by_the_return_ratio() {
        let original = PackingBreakdown {
            boxes: d("5"),
            pieces: d("0"),
            length_units: d("50"),
        };
        let allocated = original.allocate(d("50"), d("10")).unwrap();
        assert_eq!(allocated.boxes, d("1.00"));
        assert_eq!(allocated.pieces, d("0.00"));
        assert_eq!(allocated.length_units, d("10.00"));
    }

    #[test]
    fn allocate_rounds_to_two_decimals_half_up() {
        let original = PackingBreakdown {
            boxes: d("3"),
            pieces: d("7"),
            length_units: d("1"),
        };
        // ratio 1/3: 3 * 1/3 ~ 1.00, 7 * 1/3 ~ 2.33
        let third = original.allocate(d("3"), d("1")).unwrap();
        assert_eq!(third.boxes, d("1.00"));
        assert_eq!(third.pieces, d("2.33"));

        // ratio exato 0.125: metragem 0.125 arredonda meio-para-cima em 0.13
        let eighth = original.allocate(d("8"), d("1")).unwrap();
        assert_eq!(eighth.length_units, d("0.13"));
    }

    #[test]
    fn allocate_does_not_reconcile_fields_after_rounding() {
        // 3 caixas + 1 peça com ratio 1/3 dá 1.00 + 0.33: a soma não
        // reconstrói um inteiro e isso é o comportamento esperado.
        let original = PackingBreakdown {
            boxes: d("3"),
            pieces: d("1"),
            length_units: d("0"),
        };
        let allocated = original.allocate(d("3"), d("1")).unwrap();
        assert_eq!(allocated.boxes + allocated.pieces, d("1.33"));
    }

    #[test]
    fn allocate_rejects_non_positive_original_quantity() {
        let original = PackingBreakdown {
            boxes: d("1"),
            pieces: d("0"),
            length_units: d("10"),
        };
        assert!(matches!(
            original.allocate(d("0"), d("1")),
            Err(AppError::DivisionUndefined)
        ));
        assert!(matches!(
            original.allocate(d("-4"), d("1")),
            Err(AppError::DivisionUndefined)
        ));
    }

    #[test]
    fn allocate_stays_within_absolute_tolerance() {
        let original = PackingBreakdown {
            boxes: d("0"),
            pieces: d("0"),
            length_units: d("37.5"),
        };
        let allocated = original.allocate(d("37.5"), d("11.3")).unwrap();
        let exact = d("11.3");
        assert!((allocated.length_units - exact).abs() <= d("0.01"));
    }

    #[test]
    fn whole_change_rounds_the_raw_scaled_value_once() {
        let original = PackingBreakdown {
            boxes: d("4.99"),
            pieces: d("0"),
            length_units: d("0"),
        };
        // 4.99 × 0.5 = 2.495: bruto arredonda para 2; o campo rateado a
        // 2 casas (2.50) arredondaria para 3.
        let allocated = original.allocate(d("10"), d("5")).unwrap();
        assert_eq!(allocated.boxes, d("2.50"));

        let (boxes, pieces) = original.whole_box_piece_change(d("10"), d("5")).unwrap();
        assert_eq!(boxes, d("2"));
        assert_eq!(pieces, d("0"));
    }

    #[test]
    fn whole_change_rejects_non_positive_original_quantity() {
        let original = PackingBreakdown {
            boxes: d("1"),
            pieces: d("0"),
            length_units: d("10"),
        };
        assert!(matches!(
            original.whole_box_piece_change(d("0"), d("1")),
            Err(AppError::DivisionUndefined)
        ));
    }

    // --- Montagem de linha vinculada ---

    #[test]
    fn linked_line_takes_quantity_from_the_allocated_packing() {
        let snapshot = snapshot_with_packing();
        let line = build_linked_line(&snapshot, d("10")).unwrap();
        let packing = line.packing.unwrap();
        assert_eq!(packing.boxes, d("1.00"));
        assert_eq!(packing.length_units, d("10.00"));
        assert_eq!(line.quantity, d("10.00"));
        assert_eq!(line.total, d("1200.0000"));
    }

    #[test]
    fn linked_line_rejects_quantity_over_the_returnable_capacity() {
        let mut snapshot = snapshot_with_packing();
        snapshot.already_returned = d("10");
        let err = build_linked_line(&snapshot, d("45")).unwrap_err();
        assert!(matches!(err, AppError::QuantityExceeded(_)));
    }

    #[test]
    fn linked_line_clamps_negative_request_to_an_excluded_zero_line() {
        let snapshot = snapshot_with_packing();
        let line = build_linked_line(&snapshot, d("-3")).unwrap();
        assert_eq!(line.quantity, Decimal::ZERO);
        assert!(line.packing.is_none());
        assert_eq!(line.total, Decimal::ZERO);
    }

    #[test]
    fn duplicate_linked_lines_share_one_capacity() {
        // Duas linhas de 30 contra um item de 50: a primeira passa e a
        // segunda, montada com o consumo da irmã no snapshot, estoura.
        let snapshot = snapshot_with_packing();
        let first = build_linked_line(&snapshot, d("30")).unwrap();
        assert_eq!(first.quantity, d("30.00"));

        let mut with_sibling = snapshot_with_packing();
        with_sibling.id = snapshot.id;
        with_sibling.already_returned = first.quantity;
        let second = build_linked_line(&with_sibling, d("30"));
        assert!(matches!(second, Err(AppError::QuantityExceeded(_))));
    }

    #[test]
    fn linked_quantities_sum_duplicate_lines_per_item() {
        let snapshot = snapshot_with_packing();
        let ret = draft_return(vec![
            build_linked_line(&snapshot, d("30")).unwrap(),
            build_linked_line(&snapshot, d("30")).unwrap(),
            standalone_line("4", "1.00"),
        ]);
        let totals = ret.linked_quantities();
        assert_eq!(totals.len(), 1);
        // A soma agrupada é o que se compara com o teto do item, e 60
        // excede os 50 da compra mesmo com cada linha passando sozinha.
        assert_eq!(totals[&snapshot.id], d("60.00"));
        assert!(totals[&snapshot.id] > snapshot.quantity);
    }

    #[test]
    fn voiding_restores_the_returnable_capacity() {
        // Cenário completo: devolve 10 de 50, tenta 45 (falha), anula a
        // primeira (já-devolvido volta a 0) e então 45 passa.
        let snapshot = snapshot_with_packing();

        let first = build_linked_line(&snapshot, d("10")).unwrap();
        assert_eq!(first.quantity, d("10.00"));

        let mut after_first = snapshot_with_packing();
        after_first.already_returned = d("10");
        let second = build_linked_line(&after_first, d("45"));
        assert!(matches!(second, Err(AppError::QuantityExceeded(_))));

        let after_void = build_linked_line(&snapshot, d("45")).unwrap();
        assert_eq!(after_void.quantity, d("45.00"));
    }

    // --- Montagem de linha avulsa ---

    #[test]
    fn standalone_line_rejects_non_positive_quantity() {
        let err = build_standalone_line(
            Uuid::new_v4(),
            None,
            "Zíper",
            "ZIP-1",
            d("0"),
            None,
            d("2.50"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidQuantity(_)));
    }

    #[test]
    fn standalone_line_has_no_upper_bound() {
        let line = build_standalone_line(
            Uuid::new_v4(),
            None,
            "Zíper",
            "ZIP-1",
            d("10000"),
            None,
            d("2.50"),
            None,
            None,
        )
        .unwrap();
        assert_eq!(line.total, d("25000.00"));
        assert_eq!(line.source, ReturnLineSource::Standalone);
    }

    #[test]
    fn standalone_line_packing_length_overrides_the_quantity() {
        let packing = PackingBreakdown {
            boxes: d("2"),
            pieces: d("0"),
            length_units: d("18.40"),
        };
        let line = build_standalone_line(
            Uuid::new_v4(),
            None,
            "Tecido",
            "TEC-9",
            d("18"),
            Some("m"),
            d("10.00"),
            Some(packing),
            None,
        )
        .unwrap();
        assert_eq!(line.quantity, d("18.40"));
        assert_eq!(line.total, d("184.0000"));
    }

    // --- Agregado ---

    #[test]
    fn recompute_totals_is_idempotent() {
        let mut ret = draft_return(vec![
            standalone_line("3", "10.00"),
            standalone_line("2", "5.50"),
        ]);
        ret.recompute_totals();
        let first = (ret.subtotal, ret.total);
        ret.recompute_totals();
        assert_eq!((ret.subtotal, ret.total), first);
        assert_eq!(ret.subtotal, d("41.00"));
        assert_eq!(ret.total, ret.subtotal);
    }

    #[test]
    fn add_and_remove_line_keep_totals_in_sync() {
        let mut ret = draft_return(vec![standalone_line("3", "10.00")]);
        assert_eq!(ret.total, d("30.00"));

        ret.add_line(standalone_line("1", "7.00"));
        assert_eq!(ret.total, d("37.00"));

        let removed = ret.remove_line(0).unwrap();
        assert_eq!(removed.total, d("30.00"));
        assert_eq!(ret.total, d("7.00"));

        assert!(ret.remove_line(5).is_none());
        assert_eq!(ret.total, d("7.00"));
    }

    #[test]
    fn is_submittable_requires_draft_supplier_and_a_positive_line() {
        let ret = draft_return(vec![standalone_line("3", "10.00")]);
        assert!(ret.is_submittable());

        let mut unnamed = ret.clone();
        unnamed.supplier_name = "   ".to_string();
        assert!(!unnamed.is_submittable());

        let empty = draft_return(vec![]);
        assert!(!empty.is_submittable());

        let mut finalized = ret.clone();
        finalized.status = ReturnStatus::Final;
        assert!(!finalized.is_submittable());
    }

    // --- Fechamento da máquina de estados ---

    #[test]
    fn draft_admits_only_finalize_and_delete() {
        let ret = draft_return(vec![standalone_line("3", "10.00")]);
        assert!(ret.ensure_can_finalize().is_ok());
        assert!(ret.ensure_can_delete().is_ok());
        assert!(matches!(
            ret.ensure_can_void(),
            Err(AppError::IllegalStateTransition(_))
        ));
    }

    #[test]
    fn finalize_requires_a_positive_line() {
        let mut ret = draft_return(vec![standalone_line("3", "10.00")]);
        ret.lines[0].quantity = Decimal::ZERO;
        assert!(matches!(
            ret.ensure_can_finalize(),
            Err(AppError::MissingRequiredField(_))
        ));
    }

    #[test]
    fn final_admits_only_void() {
        let mut ret = draft_return(vec![standalone_line("3", "10.00")]);
        ret.status = ReturnStatus::Final;
        assert!(ret.ensure_can_void().is_ok());
        assert!(matches!(
            ret.ensure_can_finalize(),
            Err(AppError::IllegalStateTransition(_))
        ));
        assert!(matches!(
            ret.ensure_can_delete(),
            Err(AppError::IllegalStateTransition(_))
        ));
    }

    #[test]
    fn void_is_terminal() {
        let mut ret = draft_return(vec![standalone_line("3", "10.00")]);
        ret.status = ReturnStatus::Void;
        assert!(ret.ensure_can_finalize().is_err());
        assert!(ret.ensure_can_void().is_err());
        assert!(ret.ensure_can_delete().is_err());
    }

    // --- Ida e volta pelo banco ---

    #[test]
    fn item_row_rebuilds_source_and_packing() {
        let purchase_item_id = Uuid::new_v4();
        let row = ReturnItemRow {
            id: Uuid::new_v4(),
            purchase_return_id: Uuid::new_v4(),
            purchase_item_id: Some(purchase_item_id),
            product_id: Uuid::new_v4(),
            variation_id: None,
            product_name: "Tecido".to_string(),
            sku: "TEC-1".to_string(),
            quantity: d("10.00"),
            unit: Some("m".to_string()),
            unit_price: d("12.00"),
            total: d("120.00"),
            notes: None,
            packing_boxes: Some(d("1.00")),
            packing_pieces: Some(d("0.00")),
            packing_meters: Some(d("10.00")),
        };
        let line = row.into_line();
        assert_eq!(line.source, ReturnLineSource::Linked { purchase_item_id });
        assert_eq!(line.packing.unwrap().length_units, d("10.00"));

        let standalone = ReturnItemRow {
            id: Uuid::new_v4(),
            purchase_return_id: Uuid::new_v4(),
            purchase_item_id: None,
            product_id: Uuid::new_v4(),
            variation_id: None,
            product_name: "Botão".to_string(),
            sku: "BOT-1".to_string(),
            quantity: d("4"),
            unit: None,
            unit_price: d("1.00"),
            total: d("4.00"),
            notes: None,
            packing_boxes: None,
            packing_pieces: None,
            packing_meters: None,
        }
        .into_line();
        assert_eq!(standalone.source, ReturnLineSource::Standalone);
        assert!(standalone.packing.is_none());
    }
}

// src/services/returns_service.rs

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LedgerRepository, PurchasesRepository, ReturnsRepository, StockRepository},
    models::{
        ledger::{EntryDirection, LedgerEntrySource},
        purchases::{PurchaseItemRow, PurchaseLineSnapshot},
        returns::{
            build_linked_line, build_standalone_line, PackingBreakdown, PurchaseReturn,
            ReturnEvent, ReturnLine, ReturnStatus,
        },
        stock::StockMovementType,
    },
};

const RETURN_SEQUENCE_TYPE: &str = "purchase_return";

/// Entrada de criação. Structs simples em vez dos payloads HTTP: o
/// service não conhece serde nem validação de borda.
#[derive(Debug, Clone)]
pub struct CreateReturnInput {
    pub branch_id: Uuid,
    pub original_purchase_id: Option<Uuid>,
    pub return_date: Option<NaiveDate>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub lines: Vec<ReturnLineInput>,
}

#[derive(Debug, Clone)]
pub enum ReturnLineInput {
    Linked {
        purchase_item_id: Uuid,
        quantity: Decimal,
        notes: Option<String>,
    },
    Standalone {
        product_id: Uuid,
        variation_id: Option<Uuid>,
        product_name: String,
        sku: String,
        quantity: Decimal,
        unit: Option<String>,
        unit_price: Decimal,
        packing: Option<PackingBreakdown>,
        notes: Option<String>,
    },
}

// O controller do ciclo de vida: cria rascunhos, finaliza (estoque +
// razão do fornecedor), anula (estorno simétrico) e exclui rascunhos.
// Cada operação é uma transação única; falhou, nada foi gravado.
#[derive(Clone)]
pub struct ReturnsService {
    returns_repo: ReturnsRepository,
    purchases_repo: PurchasesRepository,
    stock_repo: StockRepository,
    ledger_repo: LedgerRepository,
}

impl ReturnsService {
    pub fn new(
        returns_repo: ReturnsRepository,
        purchases_repo: PurchasesRepository,
        stock_repo: StockRepository,
        ledger_repo: LedgerRepository,
    ) -> Self {
        Self {
            returns_repo,
            purchases_repo,
            stock_repo,
            ledger_repo,
        }
    }

    /// Cria uma devolução em rascunho (vinculada a uma compra ou avulsa).
    ///
    /// Rascunho não toca estoque nem razão: esses efeitos são exclusivos
    /// do finalize.
    pub async fn create_return<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        input: CreateReturnInput,
    ) -> Result<PurchaseReturn, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        // Compra de origem (quando vinculada): precisa existir e aceitar
        // devoluções. Fornecedor herda da compra se não vier na entrada.
        let mut supplier_id = input.supplier_id;
        let mut supplier_name = input.supplier_name.clone().unwrap_or_default();
        let mut purchase_items: Vec<PurchaseItemRow> = Vec::new();

        if let Some(purchase_id) = input.original_purchase_id {
            let purchase = self
                .purchases_repo
                .get_purchase(&mut *tx, company_id, purchase_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Compra de origem não encontrada.".to_string()))?;

            if !purchase.status.accepts_returns() {
                return Err(AppError::IllegalStateTransition(
                    "Devolução só pode ser criada contra compra finalizada ou recebida."
                        .to_string(),
                ));
            }

            if supplier_id.is_none() {
                supplier_id = purchase.supplier_id;
            }
            if supplier_name.trim().is_empty() {
                supplier_name = purchase.supplier_name.clone();
            }

            purchase_items = self.purchases_repo.list_items(&mut *tx, purchase_id).await?;
        }

        // Monta as linhas. Linhas vinculadas zeradas são descartadas
        // (ajuste para baixo até zero significa "não devolver esta").
        // Linhas irmãs do mesmo item consomem o mesmo teto dentro do
        // pedido: o que uma já pediu entra no já-devolvido da próxima.
        let mut lines: Vec<ReturnLine> = Vec::new();
        let mut pending: HashMap<Uuid, Decimal> = HashMap::new();
        for line_input in &input.lines {
            match line_input {
                ReturnLineInput::Linked {
                    purchase_item_id,
                    quantity,
                    notes,
                } => {
                    let item = purchase_items
                        .iter()
                        .find(|i| i.id == *purchase_item_id)
                        .ok_or_else(|| {
                            AppError::NotFound(
                                "Item da compra de origem não encontrado.".to_string(),
                            )
                        })?;

                    let consumed = pending.get(&item.id).copied().unwrap_or(Decimal::ZERO);
                    let already = self
                        .returns_repo
                        .already_returned(&mut *tx, company_id, item.id, None)
                        .await?
                        + consumed;
                    let snapshot = PurchaseLineSnapshot::from_row(item.clone(), already);

                    let mut line = build_linked_line(&snapshot, *quantity)?;
                    line.notes = notes.clone();
                    if line.quantity > Decimal::ZERO {
                        *pending.entry(item.id).or_insert(Decimal::ZERO) += line.quantity;
                        lines.push(line);
                    }
                }
                ReturnLineInput::Standalone {
                    product_id,
                    variation_id,
                    product_name,
                    sku,
                    quantity,
                    unit,
                    unit_price,
                    packing,
                    notes,
                } => {
                    let line = build_standalone_line(
                        *product_id,
                        *variation_id,
                        product_name,
                        sku,
                        *quantity,
                        unit.as_deref(),
                        *unit_price,
                        *packing,
                        notes.as_deref(),
                    )?;
                    lines.push(line);
                }
            }
        }

        let now = Utc::now();
        let mut ret = PurchaseReturn {
            id: Uuid::new_v4(),
            company_id,
            branch_id: input.branch_id,
            original_purchase_id: input.original_purchase_id,
            return_no: None,
            return_date: input.return_date.unwrap_or_else(|| now.date_naive()),
            supplier_id,
            supplier_name,
            status: ReturnStatus::Draft,
            reason: input.reason,
            notes: input.notes,
            lines,
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };
        ret.recompute_totals();

        if ret.supplier_name.trim().is_empty() {
            return Err(AppError::MissingRequiredField(
                "Informe o fornecedor da devolução.".to_string(),
            ));
        }
        if !ret.is_submittable() {
            return Err(AppError::MissingRequiredField(
                "A devolução precisa de ao menos uma linha com quantidade positiva.".to_string(),
            ));
        }

        ret.return_no = Some(self.next_return_no(&mut tx, company_id, ret.branch_id).await?);

        let row = self.returns_repo.insert_return(&mut *tx, &ret).await?;
        for line in &ret.lines {
            self.returns_repo.insert_item(&mut *tx, row.id, line).await?;
        }

        tx.commit().await?;

        tracing::info!(
            return_id = %row.id,
            return_no = ?row.return_no,
            total = %row.total,
            "Devolução de compra criada em rascunho"
        );

        let lines = ret.lines;
        Ok(row.into_aggregate(lines))
    }

    /// Finaliza um rascunho: baixa o estoque, registra o movimento e
    /// debita o razão do fornecedor. Tudo na mesma transação da
    /// transição de status.
    pub async fn finalize_return<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        return_id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<ReturnEvent, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let row = self
            .returns_repo
            .get_return_row_for_update(&mut *tx, company_id, return_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Devolução não encontrada.".to_string()))?;
        let items = self.returns_repo.list_items(&mut *tx, row.id).await?;
        let ret = row.into_aggregate(items.into_iter().map(|i| i.into_line()).collect());

        ret.ensure_can_finalize()?;

        // Re-checagem do limite sob lock: entre o rascunho e o finalize,
        // outra devolução pode ter consumido a capacidade da linha. A
        // comparação usa a soma por item (linhas duplicadas dividem o
        // mesmo teto), já que o já-devolvido exclui esta devolução inteira.
        let purchase_items = match ret.original_purchase_id {
            Some(purchase_id) => self.purchases_repo.lock_items(&mut *tx, purchase_id).await?,
            None => Vec::new(),
        };
        for (purchase_item_id, requested) in ret.linked_quantities() {
            let item = purchase_items
                .iter()
                .find(|i| i.id == purchase_item_id)
                .ok_or_else(|| {
                    AppError::NotFound("Item da compra de origem não encontrado.".to_string())
                })?;
            let already = self
                .returns_repo
                .already_returned(&mut *tx, company_id, purchase_item_id, Some(ret.id))
                .await?;
            if requested > item.quantity - already {
                return Err(AppError::ConcurrentModification(format!(
                    "{}: a capacidade devolvível foi consumida \
                     (pedido {}, restante {}).",
                    item.product_name,
                    requested,
                    item.quantity - already
                )));
            }
        }

        self.apply_stock_effects(
            &mut tx,
            &ret,
            &purchase_items,
            StockMovementType::PurchaseReturn,
            actor,
        )
        .await?;
        self.post_ledger_entry(&mut tx, &ret, EntryDirection::Debit)
            .await?;

        let changed = self
            .returns_repo
            .update_status(&mut *tx, company_id, ret.id, ReturnStatus::Draft, ReturnStatus::Final)
            .await?;
        if changed == 0 {
            return Err(AppError::ConcurrentModification(
                "A devolução mudou de status durante a finalização.".to_string(),
            ));
        }

        tx.commit().await?;

        tracing::info!(
            return_id = %ret.id,
            return_no = ?ret.return_no,
            total = %ret.total,
            "Devolução de compra finalizada"
        );

        Ok(ReturnEvent::ReturnFinalized {
            return_id: ret.id,
            total: ret.total,
        })
    }

    /// Anula uma devolução finalizada: estorna o estoque e credita o
    /// razão com o mesmo total, zerando o efeito líquido. O registro
    /// permanece (Void é terminal), só a capacidade devolvível volta.
    pub async fn void_return<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        return_id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<ReturnEvent, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let row = self
            .returns_repo
            .get_return_row_for_update(&mut *tx, company_id, return_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Devolução não encontrada.".to_string()))?;
        let items = self.returns_repo.list_items(&mut *tx, row.id).await?;
        let ret = row.into_aggregate(items.into_iter().map(|i| i.into_line()).collect());

        ret.ensure_can_void()?;

        // Itens da compra de origem para refazer o rateio inteiro de
        // caixas/peças do estorno; sem lock, o void não briga pelo teto.
        let purchase_items = match ret.original_purchase_id {
            Some(purchase_id) => self.purchases_repo.list_items(&mut *tx, purchase_id).await?,
            None => Vec::new(),
        };

        self.apply_stock_effects(
            &mut tx,
            &ret,
            &purchase_items,
            StockMovementType::PurchaseReturnVoid,
            actor,
        )
        .await?;
        self.post_ledger_entry(&mut tx, &ret, EntryDirection::Credit)
            .await?;

        let changed = self
            .returns_repo
            .update_status(&mut *tx, company_id, ret.id, ReturnStatus::Final, ReturnStatus::Void)
            .await?;
        if changed == 0 {
            return Err(AppError::ConcurrentModification(
                "A devolução mudou de status durante a anulação.".to_string(),
            ));
        }

        tx.commit().await?;

        tracing::info!(
            return_id = %ret.id,
            return_no = ?ret.return_no,
            total = %ret.total,
            "Devolução de compra anulada"
        );

        Ok(ReturnEvent::ReturnVoided {
            return_id: ret.id,
            total: ret.total,
        })
    }

    /// Exclui fisicamente um rascunho (as linhas caem por cascata).
    /// Final e Void nunca são excluídos.
    pub async fn delete_return<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        return_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let row = self
            .returns_repo
            .get_return_row_for_update(&mut *tx, company_id, return_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Devolução não encontrada.".to_string()))?;
        let items = self.returns_repo.list_items(&mut *tx, row.id).await?;
        let ret = row.into_aggregate(items.into_iter().map(|i| i.into_line()).collect());

        ret.ensure_can_delete()?;

        let deleted = self
            .returns_repo
            .delete_draft(&mut *tx, company_id, return_id)
            .await?;
        if deleted == 0 {
            return Err(AppError::ConcurrentModification(
                "A devolução mudou de status durante a exclusão.".to_string(),
            ));
        }

        tx.commit().await?;

        tracing::info!(return_id = %return_id, "Rascunho de devolução excluído");
        Ok(())
    }

    pub async fn get_return<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        return_id: Uuid,
    ) -> Result<PurchaseReturn, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let row = self
            .returns_repo
            .get_return_row(&mut *conn, company_id, return_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Devolução não encontrada.".to_string()))?;
        let items = self.returns_repo.list_items(&mut *conn, row.id).await?;

        Ok(row.into_aggregate(items.into_iter().map(|i| i.into_line()).collect()))
    }

    pub async fn list_returns<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        branch_id: Option<Uuid>,
    ) -> Result<Vec<PurchaseReturn>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let rows = self
            .returns_repo
            .list_returns(&mut *conn, company_id, branch_id)
            .await?;

        let mut returns = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.returns_repo.list_items(&mut *conn, row.id).await?;
            returns.push(row.into_aggregate(items.into_iter().map(|i| i.into_line()).collect()));
        }
        Ok(returns)
    }

    /// Linhas da compra de origem com a capacidade devolvível já
    /// calculada; é o que a tela de devolução consome.
    pub async fn get_original_purchase_items<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Vec<PurchaseLineSnapshot>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        self.purchases_repo
            .get_purchase(&mut *conn, company_id, purchase_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Compra não encontrada.".to_string()))?;

        let items = self.purchases_repo.list_items(&mut *conn, purchase_id).await?;
        let mut snapshots = Vec::with_capacity(items.len());
        for item in items {
            let already = self
                .returns_repo
                .already_returned(&mut *conn, company_id, item.id, None)
                .await?;
            snapshots.push(PurchaseLineSnapshot::from_row(item, already));
        }
        Ok(snapshots)
    }

    // --- Auxiliares internos ---

    /// Numeração do documento: sequência configurada da empresa, com
    /// fallback PRET-AAAAMMDD-nnnn quando não há sequência cadastrada.
    async fn next_return_no(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        company_id: Uuid,
        branch_id: Uuid,
    ) -> Result<String, AppError> {
        let seq = self
            .returns_repo
            .bump_sequence(&mut **tx, company_id, Some(branch_id), RETURN_SEQUENCE_TYPE)
            .await?;
        // Sequência da filial tem prioridade; sem ela, tenta a da empresa.
        let seq = match seq {
            Some(seq) => Some(seq),
            None => {
                self.returns_repo
                    .bump_sequence(&mut **tx, company_id, None, RETURN_SEQUENCE_TYPE)
                    .await?
            }
        };

        match seq {
            Some(seq) => Ok(format!(
                "{}{:0width$}",
                seq.prefix,
                seq.current_number,
                width = seq.padding.max(0) as usize
            )),
            None => {
                let date = Utc::now().format("%Y%m%d");
                let suffix = (Uuid::new_v4().as_u128() % 10_000) as u32;
                Ok(format!("PRET-{date}-{suffix:04}"))
            }
        }
    }

    /// Efeitos de estoque de finalize/void: um ajuste de saldo e um
    /// movimento no histórico por linha positiva. O sinal vem do tipo
    /// do movimento, então finalize e void são simétricos por construção.
    async fn apply_stock_effects(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        ret: &PurchaseReturn,
        purchase_items: &[PurchaseItemRow],
        movement_type: StockMovementType,
        actor: Option<Uuid>,
    ) -> Result<(), AppError> {
        let notes = match movement_type {
            StockMovementType::PurchaseReturnVoid => format!(
                "Anulação da devolução {}",
                ret.return_no.as_deref().unwrap_or("sem número")
            ),
            _ => format!(
                "Devolução {}",
                ret.return_no.as_deref().unwrap_or("sem número")
            ),
        };

        for line in &ret.lines {
            if line.quantity <= Decimal::ZERO {
                continue;
            }
            let signed_qty = movement_type.signed(line.quantity);

            self.stock_repo
                .adjust_stock(
                    &mut **tx,
                    ret.company_id,
                    ret.branch_id,
                    line.product_id,
                    line.variation_id,
                    signed_qty,
                )
                .await?;

            // Caixas/peças entram inteiras no histórico, com o mesmo
            // sinal da quantidade; zero vira ausência. Linha vinculada
            // escala a embalagem original da compra de uma vez só; na
            // avulsa a embalagem da linha já é o total devolvido.
            let (box_change, piece_change) = match &line.packing {
                Some(packing) => {
                    let original = line
                        .purchase_item_id()
                        .and_then(|id| purchase_items.iter().find(|i| i.id == id))
                        .and_then(|item| item.packing().map(|p| (p, item.quantity)));
                    let (boxes, pieces) = match original {
                        Some((original_packing, original_qty)) => original_packing
                            .whole_box_piece_change(original_qty, line.quantity)?,
                        None => packing.whole_box_piece_change(line.quantity, line.quantity)?,
                    };
                    let sign = |v: Decimal| {
                        (v > Decimal::ZERO).then(|| movement_type.signed(v))
                    };
                    (sign(boxes), sign(pieces))
                }
                None => (None, None),
            };

            self.stock_repo
                .record_movement(
                    &mut **tx,
                    ret.company_id,
                    ret.branch_id,
                    line.product_id,
                    line.variation_id,
                    movement_type,
                    signed_qty,
                    Some(line.unit_price),
                    Some(line.total),
                    box_change,
                    piece_change,
                    Some(ret.id),
                    Some(&notes),
                    actor,
                )
                .await?;
        }
        Ok(())
    }

    /// Lançamento no razão do fornecedor. Sem fornecedor identificado ou
    /// com total zero, não há o que lançar.
    async fn post_ledger_entry(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        ret: &PurchaseReturn,
        direction: EntryDirection,
    ) -> Result<(), AppError> {
        let Some(supplier_id) = ret.supplier_id else {
            return Ok(());
        };
        if ret.total <= Decimal::ZERO {
            return Ok(());
        }

        let ledger = self
            .ledger_repo
            .get_or_create(&mut **tx, ret.company_id, supplier_id, &ret.supplier_name)
            .await?;

        let (debit, credit) = direction.amounts(ret.total);
        let remarks = match direction {
            EntryDirection::Debit => "Devolução de compra",
            EntryDirection::Credit => "Anulação de devolução de compra",
        };

        self.ledger_repo
            .add_entry(
                &mut **tx,
                ret.company_id,
                ledger.id,
                ret.return_date,
                debit,
                credit,
                LedgerEntrySource::PurchaseReturn,
                ret.return_no.as_deref(),
                Some(ret.id),
                Some(remarks),
            )
            .await?;
        Ok(())
    }
}

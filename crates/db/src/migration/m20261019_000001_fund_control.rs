//! Fund control schema.
//!
//! Creates the fiscal, budget, obligation, approval and audit tables.
//! Balance columns carry CHECK constraints so that the database rejects
//! an over-obligated appropriation or an over-spent obligation even if a
//! writer bypasses the guarded updates.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: FISCAL YEARS AND APPROPRIATIONS
        // ============================================================
        db.execute_unprepared(FISCAL_YEARS_SQL).await?;
        db.execute_unprepared(APPROPRIATIONS_SQL).await?;

        // ============================================================
        // PART 2: APPROVAL TEMPLATES
        // ============================================================
        db.execute_unprepared(APPROVAL_WORKFLOWS_SQL).await?;

        // ============================================================
        // PART 3: BUDGETS AND VERSIONS
        // ============================================================
        db.execute_unprepared(BUDGETS_SQL).await?;
        db.execute_unprepared(BUDGET_VERSIONS_SQL).await?;

        // ============================================================
        // PART 4: OBLIGATIONS AND EXPENDITURES
        // ============================================================
        db.execute_unprepared(OBLIGATIONS_SQL).await?;
        db.execute_unprepared(EXPENDITURES_SQL).await?;

        // ============================================================
        // PART 5: APPROVAL REQUESTS AND AUDIT
        // ============================================================
        db.execute_unprepared(APPROVAL_REQUESTS_SQL).await?;
        db.execute_unprepared(AUDIT_RECORDS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const FISCAL_YEARS_SQL: &str = r"
CREATE TABLE fiscal_years (
    id UUID PRIMARY KEY,
    year INTEGER NOT NULL UNIQUE,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    status VARCHAR(16) NOT NULL,
    CONSTRAINT chk_fiscal_year_dates CHECK (end_date > start_date),
    CONSTRAINT chk_fiscal_year_status CHECK (status IN ('future', 'current', 'past', 'locked'))
);
";

const APPROPRIATIONS_SQL: &str = r"
CREATE TABLE appropriations (
    id UUID PRIMARY KEY,
    fiscal_year_id UUID NOT NULL REFERENCES fiscal_years(id),
    color_of_money VARCHAR(32) NOT NULL,
    appropriated NUMERIC(19, 4) NOT NULL,
    obligated NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expiration_date DATE NOT NULL,
    frozen BOOLEAN NOT NULL DEFAULT false,
    multi_year BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_appropriation_amount CHECK (appropriated > 0),
    CONSTRAINT chk_appropriation_obligated CHECK (obligated >= 0 AND obligated <= appropriated)
);

CREATE INDEX idx_appropriations_fiscal_year ON appropriations(fiscal_year_id);
";

const APPROVAL_WORKFLOWS_SQL: &str = r"
CREATE TABLE approval_workflows (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    steps JSONB NOT NULL,
    CONSTRAINT chk_workflow_steps CHECK (jsonb_typeof(steps) = 'array' AND jsonb_array_length(steps) > 0)
);
";

const BUDGETS_SQL: &str = r"
CREATE TABLE budgets (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    fiscal_year_id UUID NOT NULL REFERENCES fiscal_years(id),
    name VARCHAR(255) NOT NULL,
    approval_workflow_id UUID REFERENCES approval_workflows(id),
    current_version INTEGER NOT NULL,
    previous_version INTEGER,
    status VARCHAR(16) NOT NULL,
    requested_amount NUMERIC(19, 4) NOT NULL,
    approved_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    obligated_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expended_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_budget_status CHECK (
        status IN ('draft', 'under_review', 'approved', 'rejected', 'returned')
    ),
    CONSTRAINT chk_budget_obligated CHECK (obligated_amount >= 0),
    CONSTRAINT chk_budget_expended CHECK (expended_amount >= 0 AND expended_amount <= obligated_amount)
);

CREATE INDEX idx_budgets_fiscal_year ON budgets(fiscal_year_id);
";

const BUDGET_VERSIONS_SQL: &str = r"
CREATE TABLE budget_versions (
    budget_id UUID NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
    version_number INTEGER NOT NULL,
    state VARCHAR(16) NOT NULL,
    total_amount NUMERIC(19, 4) NOT NULL,
    line_items JSONB NOT NULL DEFAULT '[]',
    previous_version INTEGER,
    source JSONB NOT NULL,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    committed_at TIMESTAMPTZ,
    PRIMARY KEY (budget_id, version_number),
    CONSTRAINT chk_version_number CHECK (version_number > 0),
    CONSTRAINT chk_version_state CHECK (state IN ('pending', 'current', 'frozen', 'discarded'))
);

-- At most one current and one pending version per budget
CREATE UNIQUE INDEX idx_budget_versions_current
    ON budget_versions(budget_id) WHERE state = 'current';
CREATE UNIQUE INDEX idx_budget_versions_pending
    ON budget_versions(budget_id) WHERE state = 'pending';
";

const OBLIGATIONS_SQL: &str = r"
CREATE TABLE obligations (
    id UUID PRIMARY KEY,
    budget_id UUID NOT NULL REFERENCES budgets(id),
    appropriation_id UUID NOT NULL REFERENCES appropriations(id),
    fiscal_year_id UUID NOT NULL REFERENCES fiscal_years(id),
    line_item_id UUID,
    amount NUMERIC(19, 4) NOT NULL,
    expended NUMERIC(19, 4) NOT NULL DEFAULT 0,
    obligation_date DATE NOT NULL,
    bona_fide_need_override TEXT,
    active BOOLEAN NOT NULL DEFAULT true,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    cancelled_at TIMESTAMPTZ,
    CONSTRAINT chk_obligation_amount CHECK (amount > 0),
    CONSTRAINT chk_obligation_expended CHECK (expended >= 0 AND expended <= amount),
    CONSTRAINT chk_obligation_cancelled CHECK (active OR cancelled_at IS NOT NULL)
);

CREATE INDEX idx_obligations_budget ON obligations(budget_id, created_at);
CREATE INDEX idx_obligations_appropriation ON obligations(appropriation_id);
";

const EXPENDITURES_SQL: &str = r"
CREATE TABLE expenditures (
    id UUID PRIMARY KEY,
    obligation_id UUID NOT NULL REFERENCES obligations(id),
    amount NUMERIC(19, 4) NOT NULL,
    expenditure_date DATE NOT NULL,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_expenditure_amount CHECK (amount > 0)
);

CREATE INDEX idx_expenditures_obligation ON expenditures(obligation_id, created_at);
";

const APPROVAL_REQUESTS_SQL: &str = r"
CREATE TABLE approval_requests (
    id UUID PRIMARY KEY,
    workflow_id UUID NOT NULL REFERENCES approval_workflows(id),
    budget_id UUID NOT NULL REFERENCES budgets(id),
    version_number INTEGER NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    status VARCHAR(16) NOT NULL,
    review_level SMALLINT,
    delegated_to UUID,
    due_at TIMESTAMPTZ,
    submitted_by UUID NOT NULL,
    records JSONB NOT NULL DEFAULT '[]',
    revision BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_request_status CHECK (
        status IN ('draft', 'submitted', 'under_review', 'approved', 'rejected', 'returned')
    ),
    CONSTRAINT chk_request_level CHECK (
        (status = 'under_review') = (review_level IS NOT NULL AND review_level > 0)
    )
);

CREATE INDEX idx_approval_requests_budget ON approval_requests(budget_id, created_at DESC);
";

const AUDIT_RECORDS_SQL: &str = r"
CREATE TABLE audit_records (
    id UUID PRIMARY KEY,
    actor UUID,
    action VARCHAR(64) NOT NULL,
    entity_type VARCHAR(32) NOT NULL,
    entity_id UUID NOT NULL,
    before_state JSONB,
    after_state JSONB,
    occurred_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_audit_records_entity ON audit_records(entity_type, entity_id, occurred_at);

-- Audit history is append-only
CREATE OR REPLACE FUNCTION prevent_audit_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'audit_records is append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_audit_records_immutable
    BEFORE UPDATE OR DELETE ON audit_records
    FOR EACH ROW EXECUTE FUNCTION prevent_audit_mutation();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_audit_records_immutable ON audit_records;
DROP FUNCTION IF EXISTS prevent_audit_mutation();

DROP TABLE IF EXISTS audit_records CASCADE;
DROP TABLE IF EXISTS approval_requests CASCADE;
DROP TABLE IF EXISTS expenditures CASCADE;
DROP TABLE IF EXISTS obligations CASCADE;
DROP TABLE IF EXISTS budget_versions CASCADE;
DROP TABLE IF EXISTS budgets CASCADE;
DROP TABLE IF EXISTS approval_workflows CASCADE;
DROP TABLE IF EXISTS appropriations CASCADE;
DROP TABLE IF EXISTS fiscal_years CASCADE;
";

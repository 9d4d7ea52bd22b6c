/// PostgreSQL storage adapter
///
/// Runtime-checked sqlx queries against the schema in `migrations/`. Rows are
/// read into private record types and converted into models here, so a
/// stored value that no longer parses surfaces as [`StoreError::Corrupt`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, Transaction};

use super::{Store, StoreError, StoreTx};
use crate::models::{
    AuditEntry, DashboardHistory, DashboardListingRow, DashboardRow, DashboardSummary,
    Datasource, MenuItem, NewDatasource, NewTeam, Role, Team, TeamId, TeamMember, TeamStatus,
    TenantId, UserId, VisibleTo,
};

#[derive(Debug, FromRow)]
struct TeamRecord {
    id: i64,
    name: String,
    brief: String,
    tenant_id: i64,
    is_public: bool,
    status: i16,
    sync_users: bool,
    created_by: i64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl From<TeamRecord> for Team {
    fn from(r: TeamRecord) -> Self {
        Team {
            id: r.id,
            name: r.name,
            brief: r.brief,
            tenant_id: r.tenant_id,
            is_public: r.is_public,
            status: TeamStatus::from_code(r.status),
            sync_users: r.sync_users,
            created_by: r.created_by,
            created: r.created,
            updated: r.updated,
        }
    }
}

#[derive(Debug, FromRow)]
struct DashboardRecord {
    id: String,
    title: String,
    team_id: i64,
    visible_to: String,
    tags: String,
    data: String,
    weight: i32,
    created_by: i64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl TryFrom<DashboardRecord> for DashboardRow {
    type Error = StoreError;

    fn try_from(r: DashboardRecord) -> Result<Self, Self::Error> {
        Ok(DashboardRow {
            visible_to: parse_visibility(&r.visible_to)?,
            id: r.id,
            title: r.title,
            owned_by: r.team_id,
            tags: r.tags,
            data: r.data,
            weight: r.weight,
            created_by: r.created_by,
            created: r.created,
            updated: r.updated,
        })
    }
}

#[derive(Debug, FromRow)]
struct ListingRecord {
    id: String,
    title: String,
    team_id: i64,
    team_name: String,
    visible_to: String,
    tags: String,
    weight: i32,
    created: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct DatasourceRecord {
    id: i64,
    name: String,
    kind: String,
    url: String,
    team_id: i64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

fn parse_visibility(raw: &str) -> Result<VisibleTo, StoreError> {
    raw.parse::<VisibleTo>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn parse_role(raw: &str) -> Result<Role, StoreError> {
    raw.parse::<Role>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

const DASHBOARD_COLUMNS: &str =
    "id, title, team_id, visible_to, tags, data, weight, created_by, created, updated";

/// [`Store`] backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_team(&self, team_id: TeamId) -> Result<Team, StoreError> {
        let record = sqlx::query_as::<_, TeamRecord>(
            r#"
            SELECT id, name, brief, tenant_id, is_public, status, sync_users,
                   created_by, created, updated
            FROM team
            WHERE id = $1 AND status = 0
            "#,
        )
        .bind(team_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    async fn team_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<Option<TeamMember>, StoreError> {
        let role: Option<String> = sqlx::query_scalar(
            r#"
            SELECT tm.role
            FROM team_member tm
            JOIN team t ON t.id = tm.team_id
            WHERE tm.team_id = $1 AND tm.user_id = $2 AND t.status = 0
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        role.map(|raw| {
            Ok(TeamMember {
                team_id,
                user_id,
                role: parse_role(&raw)?,
            })
        })
        .transpose()
    }

    async fn tenant_of_team(&self, team_id: TeamId) -> Result<TenantId, StoreError> {
        let tenant_id: i64 =
            sqlx::query_scalar("SELECT tenant_id FROM team WHERE id = $1 AND status = 0")
                .bind(team_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(tenant_id)
    }

    async fn tenant_role(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<Role>, StoreError> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM tenant_user WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        role.map(|raw| parse_role(&raw)).transpose()
    }

    async fn member_team_ids(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<TeamId>, StoreError> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT tm.team_id
            FROM team_member tm
            JOIN team t ON t.id = tm.team_id
            WHERE tm.tenant_id = $1 AND tm.user_id = $2 AND t.status = 0
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn public_team_ids(&self, tenant_id: TenantId) -> Result<Vec<TeamId>, StoreError> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM team WHERE tenant_id = $1 AND is_public = TRUE AND status = 0",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn side_menu(&self, team_id: TeamId) -> Result<Vec<MenuItem>, StoreError> {
        let raw: String =
            sqlx::query_scalar("SELECT sidemenu FROM team WHERE id = $1 AND status = 0")
                .bind(team_id)
                .fetch_one(&self.pool)
                .await?;

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(format!("side menu: {}", e)))
    }

    async fn team_datasources(&self, team_id: TeamId) -> Result<Vec<Datasource>, StoreError> {
        let records = sqlx::query_as::<_, DatasourceRecord>(
            r#"
            SELECT id, name, type AS kind, url, team_id, created, updated
            FROM datasource
            WHERE team_id = $1
            ORDER BY id
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(|r| Datasource {
                id: r.id,
                name: r.name,
                kind: r.kind,
                url: r.url,
                team_id: r.team_id,
                created: r.created,
                updated: r.updated,
            })
            .collect())
    }

    async fn mark_team_deleted(
        &self,
        team_id: TeamId,
        updated: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("UPDATE team SET status = $2, updated = $3 WHERE id = $1 AND status = 0")
                .bind(team_id)
                .bind(TeamStatus::Deleted.code())
                .bind(updated)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn find_dashboard(&self, id: &str) -> Result<DashboardRow, StoreError> {
        let record = sqlx::query_as::<_, DashboardRecord>(&format!(
            "SELECT {} FROM dashboard WHERE id = $1",
            DASHBOARD_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        record.try_into()
    }

    async fn dashboard_owner(&self, id: &str) -> Result<TeamId, StoreError> {
        let team_id: i64 = sqlx::query_scalar("SELECT team_id FROM dashboard WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(team_id)
    }

    async fn insert_dashboard(&self, row: &DashboardRow) -> Result<(), StoreError> {
        insert_dashboard_row(&self.pool, row, false).await?;
        Ok(())
    }

    async fn update_dashboard(&self, row: &DashboardRow) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE dashboard
            SET title = $2, tags = $3, data = $4, team_id = $5, visible_to = $6, updated = $7
            WHERE id = $1
            "#,
        )
        .bind(&row.id)
        .bind(&row.title)
        .bind(&row.tags)
        .bind(&row.data)
        .bind(row.owned_by)
        .bind(row.visible_to.as_str())
        .bind(row.updated)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_dashboard_weight(&self, id: &str, weight: i32) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE dashboard SET weight = $2 WHERE id = $1")
            .bind(id)
            .bind(weight)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn team_dashboards(&self, team_id: TeamId) -> Result<Vec<DashboardSummary>, StoreError> {
        let rows: Vec<(String, String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, title, created, updated FROM dashboard WHERE team_id = $1 ORDER BY created",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title, created, updated)| DashboardSummary {
                id,
                title,
                created,
                updated,
            })
            .collect())
    }

    async fn search_dashboards(
        &self,
        team_ids: &[TeamId],
    ) -> Result<Vec<DashboardListingRow>, StoreError> {
        let records = sqlx::query_as::<_, ListingRecord>(
            r#"
            SELECT d.id, d.title, d.team_id, t.name AS team_name, d.visible_to,
                   d.tags, d.weight, d.created
            FROM dashboard d
            JOIN team t ON t.id = d.team_id
            WHERE d.team_id = ANY($1)
            ORDER BY d.weight DESC, d.created DESC
            "#,
        )
        .bind(team_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        records
            .into_iter()
            .map(|r| {
                Ok(DashboardListingRow {
                    visible_to: parse_visibility(&r.visible_to)?,
                    id: r.id,
                    title: r.title,
                    owned_by: r.team_id,
                    owner_name: r.team_name,
                    tags: r.tags,
                    weight: r.weight,
                    created: r.created,
                })
            })
            .collect()
    }

    async fn insert_star(
        &self,
        user_id: UserId,
        dashboard_id: &str,
        created: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO star_dashboard (user_id, dashboard_id, created)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, dashboard_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(dashboard_id)
        .bind(created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_star(&self, user_id: UserId, dashboard_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM star_dashboard WHERE user_id = $1 AND dashboard_id = $2")
            .bind(user_id)
            .bind(dashboard_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_starred(&self, user_id: UserId, dashboard_id: &str) -> Result<bool, StoreError> {
        let starred: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM star_dashboard WHERE user_id = $1 AND dashboard_id = $2)",
        )
        .bind(user_id)
        .bind(dashboard_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(starred)
    }

    async fn starred_dashboards(&self, user_id: UserId) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar(
            "SELECT dashboard_id FROM star_dashboard WHERE user_id = $1 ORDER BY created",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn insert_history(&self, entry: &DashboardHistory) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(&entry.snapshot)
            .map_err(|e| StoreError::Corrupt(format!("history snapshot: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO dashboard_history (dashboard_id, changes, snapshot, created_by, created)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.dashboard_id)
        .bind(entry.changes.as_deref())
        .bind(snapshot)
        .bind(entry.created_by)
        .bind(entry.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (actor_id, action, target_id, snapshot, created)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(&entry.target_id)
        .bind(entry.snapshot.to_string())
        .bind(entry.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Inserts a dashboard row; with `skip_existing` a taken id is left alone
/// and reported as zero affected rows instead of aborting the transaction
async fn insert_dashboard_row<'e, E>(
    executor: E,
    row: &DashboardRow,
    skip_existing: bool,
) -> Result<u64, StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let on_conflict = if skip_existing {
        "ON CONFLICT (id) DO NOTHING"
    } else {
        ""
    };
    let result = sqlx::query(&format!(
        r#"
        INSERT INTO dashboard (id, title, team_id, visible_to, tags, data, weight,
                               created_by, created, updated)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        {}
        "#,
        on_conflict
    ))
    .bind(row.id.clone())
    .bind(row.title.clone())
    .bind(row.owned_by)
    .bind(row.visible_to.as_str())
    .bind(row.tags.clone())
    .bind(row.data.clone())
    .bind(row.weight)
    .bind(row.created_by)
    .bind(row.created)
    .bind(row.updated)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Open PostgreSQL transaction; rolled back by sqlx when dropped uncommitted
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_team(&mut self, team: &NewTeam) -> Result<TeamId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO team (tenant_id, name, brief, created_by, created, updated)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(team.tenant_id)
        .bind(&team.name)
        .bind(&team.brief)
        .bind(team.created_by)
        .bind(team.created)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_team_member(
        &mut self,
        tenant_id: TenantId,
        member: &TeamMember,
        created: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO team_member (tenant_id, team_id, user_id, role, created, updated)
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(tenant_id)
        .bind(member.team_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(created)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_datasource(&mut self, datasource: &NewDatasource) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO datasource (name, type, url, team_id, created, updated)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(&datasource.name)
        .bind(&datasource.kind)
        .bind(&datasource.url)
        .bind(datasource.team_id)
        .bind(datasource.created)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_dashboard(&mut self, row: &DashboardRow) -> Result<(), StoreError> {
        insert_dashboard_row(&mut *self.tx, row, false).await?;
        Ok(())
    }

    async fn insert_dashboard_if_absent(
        &mut self,
        row: &DashboardRow,
    ) -> Result<bool, StoreError> {
        let inserted = insert_dashboard_row(&mut *self.tx, row, true).await?;
        Ok(inserted > 0)
    }

    async fn set_side_menu(&mut self, team_id: TeamId, menu: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE team SET sidemenu = $2 WHERE id = $1")
            .bind(team_id)
            .bind(menu)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_team_variables(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM variable WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn team_dashboard_ids(&mut self, team_id: TeamId) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar("SELECT id FROM dashboard WHERE team_id = $1")
            .bind(team_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(ids)
    }

    async fn delete_dashboard_stars(&mut self, dashboard_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM star_dashboard WHERE dashboard_id = $1")
            .bind(dashboard_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_dashboard_row(&mut self, dashboard_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM dashboard WHERE id = $1")
            .bind(dashboard_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_team_dashboards(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM dashboard WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_team_datasources(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM datasource WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_team_members(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM team_member WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_team_row(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM team WHERE id = $1")
            .bind(team_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_stored_visibility_is_corrupt() {
        assert!(matches!(parse_visibility("tenant"), Ok(VisibleTo::Tenant)));
        assert!(matches!(parse_visibility("galaxy"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_unknown_stored_role_is_corrupt() {
        assert!(matches!(parse_role("Admin"), Ok(Role::Admin)));
        assert!(matches!(parse_role("Owner"), Err(StoreError::Corrupt(_))));
    }
}

//! Rewards store: the persistence collaborator observing terminal game
//! transitions. The engine publishes [`RewardEvent`]s; this module credits
//! coins and win counters and serves cosmetic lookups, all under bounded
//! timeouts so slow storage never stalls a join or a lobby actor.

use cardroom::types::Cosmetics;
use cardroom::{GameKind, RewardEvent, UserId};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

/// Bound on any single database round trip.
const DB_TIMEOUT: Duration = Duration::from_millis(2_500);

pub struct RewardsStore {
    pool: PgPool,
    win_coins: i64,
}

impl RewardsStore {
    pub async fn connect(database_url: &str, win_coins: i64) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(DB_TIMEOUT)
            .connect(database_url)
            .await?;
        Ok(Self { pool, win_coins })
    }

    /// Credit a win. Failures are logged, never retried into the engine.
    pub async fn award_win(&self, user_id: UserId, game: GameKind) {
        let sql = match game {
            GameKind::Poker => {
                "UPDATE users SET coins = coins + $2, wins_poker = wins_poker + 1 WHERE id = $1"
            }
            GameKind::Uno => {
                "UPDATE users SET coins = coins + $2, wins_uno = wins_uno + 1 WHERE id = $1"
            }
        };
        let query = sqlx::query(sql).bind(user_id).bind(self.win_coins);
        match timeout(DB_TIMEOUT, query.execute(&self.pool)).await {
            Ok(Ok(result)) if result.rows_affected() == 1 => {
                info!(user_id, %game, "win recorded");
            }
            Ok(Ok(_)) => warn!(user_id, "win for unknown user dropped"),
            Ok(Err(err)) => warn!(user_id, %err, "reward write failed"),
            Err(_) => warn!(user_id, "reward write timed out"),
        }
    }

    /// Equipped cosmetics for a joining player. Degrades to defaults on any
    /// error or timeout so a slow lookup never delays the join.
    pub async fn fetch_cosmetics(&self, user_id: UserId) -> Cosmetics {
        let query = sqlx::query(
            "SELECT cosmetic_card_back, cosmetic_table_theme FROM users WHERE id = $1",
        )
        .bind(user_id);
        match timeout(DB_TIMEOUT, query.fetch_optional(&self.pool)).await {
            Ok(Ok(Some(row))) => Cosmetics {
                card_back: row.get("cosmetic_card_back"),
                table_theme: row.get("cosmetic_table_theme"),
            },
            Ok(Ok(None)) => Cosmetics::default(),
            Ok(Err(err)) => {
                warn!(user_id, %err, "cosmetics lookup failed, using defaults");
                Cosmetics::default()
            }
            Err(_) => {
                warn!(user_id, "cosmetics lookup timed out, using defaults");
                Cosmetics::default()
            }
        }
    }
}

/// Drain reward events from every lobby into the store. Runs for the process
/// lifetime; without a store, wins are logged and dropped.
pub async fn run_reward_worker(
    store: Option<std::sync::Arc<RewardsStore>>,
    mut events: mpsc::UnboundedReceiver<RewardEvent>,
) {
    while let Some(event) = events.recv().await {
        match &store {
            Some(store) => {
                store.award_win(event.user_id, event.game).await;
            }
            None => info!(
                user_id = event.user_id,
                game = %event.game,
                lobby = %event.code,
                "win recorded (no store configured)"
            ),
        }
    }
}

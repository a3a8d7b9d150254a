use std::{error::Error as StdError, str::FromStr};

use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Row as _, Sqlite, SqlitePool, sqlite::SqliteRow};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ConnectionStore, MessageStore, NotificationStore, RequestQuery, RequestStore};
use crate::{
    error::{CoreError, CoreResult},
    feed::{ChangeFeed, Operation, Row},
    model::{
        Connection, MentorshipRequest, Message, Notification, Profile, RequestStatus,
        UnknownVariant,
    },
};

const REQUEST_COLUMNS: &str = "id,student_id,mentor_id,message,status,created_at,updated_at";
const CONNECTION_COLUMNS: &str = "id,follower_id,following_id,created_at";
const MESSAGE_COLUMNS: &str = "id,sender_id,recipient_id,kind,content,read,created_at";
const NOTIFICATION_COLUMNS: &str = "id,user_id,kind,title,content,read,related_id,created_at";

/// All four stores over one SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub fn new(db_pool: SqlitePool, feed: ChangeFeed) -> Self {
        Self { db_pool, feed }
    }
}

fn micros(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000) as i64
}

fn decode_err(column: &str, err: impl Into<Box<dyn StdError + Send + Sync>>) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_owned(),
        source: err.into(),
    }
}

fn uuid_col(row: &SqliteRow, column: &str) -> Result<Uuid, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|err| decode_err(column, err))
}

fn opt_uuid_col(row: &SqliteRow, column: &str) -> Result<Option<Uuid>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| Uuid::parse_str(&raw).map_err(|err| decode_err(column, err)))
        .transpose()
}

fn time_col(row: &SqliteRow, column: &str) -> Result<OffsetDateTime, sqlx::Error> {
    let micros: i64 = row.try_get(column)?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .map_err(|err| decode_err(column, err))
}

fn text_col<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|err| decode_err(column, err))
}

impl FromRow<'_, SqliteRow> for Profile {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: uuid_col(row, "id")?,
            role: text_col(row, "role")?,
            display_name: row.try_get("display_name")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for MentorshipRequest {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: uuid_col(row, "id")?,
            student_id: uuid_col(row, "student_id")?,
            mentor_id: uuid_col(row, "mentor_id")?,
            message: row.try_get("message")?,
            status: text_col(row, "status")?,
            created_at: time_col(row, "created_at")?,
            updated_at: time_col(row, "updated_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Connection {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: uuid_col(row, "id")?,
            follower_id: uuid_col(row, "follower_id")?,
            following_id: uuid_col(row, "following_id")?,
            created_at: time_col(row, "created_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Message {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: uuid_col(row, "id")?,
            sender_id: uuid_col(row, "sender_id")?,
            recipient_id: uuid_col(row, "recipient_id")?,
            kind: text_col(row, "kind")?,
            content: row.try_get("content")?,
            read: row.try_get("read")?,
            created_at: time_col(row, "created_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Notification {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: uuid_col(row, "id")?,
            user_id: uuid_col(row, "user_id")?,
            kind: text_col(row, "kind")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            read: row.try_get("read")?,
            related_id: opt_uuid_col(row, "related_id")?,
            created_at: time_col(row, "created_at")?,
        })
    }
}

fn push_request_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &RequestQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(student_id) = query.student_id {
        builder.push(" AND student_id = ").push_bind(student_id.to_string());
    }
    if let Some(mentor_id) = query.mentor_id {
        builder.push(" AND mentor_id = ").push_bind(mentor_id.to_string());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

#[async_trait]
impl RequestStore for SqliteStore {
    async fn insert_request(&self, request: &MentorshipRequest) -> CoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO mentorship_requests (id,student_id,mentor_id,message,status,created_at,updated_at) VALUES (?,?,?,?,?,?,?)",
        )
        .bind(request.id.to_string())
        .bind(request.student_id.to_string())
        .bind(request.mentor_id.to_string())
        .bind(&request.message)
        .bind(request.status.as_str())
        .bind(micros(request.created_at))
        .bind(micros(request.updated_at))
        .execute(&self.db_pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(CoreError::DuplicateRequest {
                    student_id: request.student_id,
                    mentor_id: request.mentor_id,
                });
            }
            Err(err) => return Err(err.into()),
        }

        self.feed.publish(Operation::Insert, Row::MentorshipRequest(request.clone()));
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> CoreResult<Option<MentorshipRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM mentorship_requests WHERE id = ?");
        Ok(sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn find_open_request(
        &self,
        student_id: Uuid,
        mentor_id: Uuid,
    ) -> CoreResult<Option<MentorshipRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM mentorship_requests \
             WHERE student_id = ? AND mentor_id = ? AND status IN ('pending', 'accepted')"
        );
        Ok(sqlx::query_as(&sql)
            .bind(student_id.to_string())
            .bind(mentor_id.to_string())
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn transition_request(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        at: OffsetDateTime,
    ) -> CoreResult<Option<MentorshipRequest>> {
        let sql = format!(
            "UPDATE mentorship_requests SET status = ?, updated_at = ? \
             WHERE id = ? AND status = ? RETURNING {REQUEST_COLUMNS}"
        );
        let updated: Option<MentorshipRequest> = sqlx::query_as(&sql)
            .bind(to.as_str())
            .bind(micros(at))
            .bind(id.to_string())
            .bind(from.as_str())
            .fetch_optional(&self.db_pool)
            .await?;

        if let Some(request) = &updated {
            self.feed.publish(Operation::Update, Row::MentorshipRequest(request.clone()));
        }
        Ok(updated)
    }

    async fn query_requests(&self, query: &RequestQuery) -> CoreResult<Vec<MentorshipRequest>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {REQUEST_COLUMNS} FROM mentorship_requests"
        ));
        push_request_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC, id DESC");

        Ok(builder
            .build_query_as::<MentorshipRequest>()
            .fetch_all(&self.db_pool)
            .await?)
    }

    async fn count_requests(&self, query: &RequestQuery) -> CoreResult<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM mentorship_requests");
        push_request_filters(&mut builder, query);

        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl ConnectionStore for SqliteStore {
    async fn insert_connection(&self, connection: &Connection) -> CoreResult<bool> {
        let inserted = sqlx::query(
            "INSERT INTO connections (id,follower_id,following_id,created_at) VALUES (?,?,?,?) \
             ON CONFLICT (follower_id, following_id) DO NOTHING",
        )
        .bind(connection.id.to_string())
        .bind(connection.follower_id.to_string())
        .bind(connection.following_id.to_string())
        .bind(micros(connection.created_at))
        .execute(&self.db_pool)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            self.feed.publish(Operation::Insert, Row::Connection(connection.clone()));
        }
        Ok(inserted)
    }

    async fn find_connection(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> CoreResult<Option<Connection>> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE follower_id = ? AND following_id = ?"
        );
        Ok(sqlx::query_as(&sql)
            .bind(follower_id.to_string())
            .bind(following_id.to_string())
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn delete_connection(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> CoreResult<Option<Connection>> {
        let sql = format!(
            "DELETE FROM connections WHERE follower_id = ? AND following_id = ? RETURNING {CONNECTION_COLUMNS}"
        );
        let deleted: Option<Connection> = sqlx::query_as(&sql)
            .bind(follower_id.to_string())
            .bind(following_id.to_string())
            .fetch_optional(&self.db_pool)
            .await?;

        if let Some(connection) = &deleted {
            self.feed.publish(Operation::Delete, Row::Connection(connection.clone()));
        }
        Ok(deleted)
    }

    async fn followers_of(&self, user_id: Uuid) -> CoreResult<Vec<Connection>> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE following_id = ? ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.db_pool)
            .await?)
    }

    async fn following_of(&self, user_id: Uuid) -> CoreResult<Vec<Connection>> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE follower_id = ? ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.db_pool)
            .await?)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert_message(&self, message: &Message) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO messages (id,sender_id,recipient_id,kind,content,read,created_at) VALUES (?,?,?,?,?,?,?)",
        )
        .bind(message.id.to_string())
        .bind(message.sender_id.to_string())
        .bind(message.recipient_id.to_string())
        .bind(message.kind.as_str())
        .bind(&message.content)
        .bind(message.read)
        .bind(micros(message.created_at))
        .execute(&self.db_pool)
        .await?;

        self.feed.publish(Operation::Insert, Row::Message(message.clone()));
        Ok(())
    }

    async fn messages_involving(&self, user_id: Uuid) -> CoreResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE sender_id = ? OR recipient_id = ? ORDER BY created_at, id"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .bind(user_id.to_string())
            .fetch_all(&self.db_pool)
            .await?)
    }

    async fn thread(&self, user_id: Uuid, counterparty_id: Uuid) -> CoreResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?) \
             ORDER BY created_at, id"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .bind(counterparty_id.to_string())
            .bind(counterparty_id.to_string())
            .bind(user_id.to_string())
            .fetch_all(&self.db_pool)
            .await?)
    }

    async fn mark_read_from(&self, recipient_id: Uuid, sender_id: Uuid) -> CoreResult<Vec<Message>> {
        let sql = format!(
            "UPDATE messages SET read = 1 WHERE recipient_id = ? AND sender_id = ? AND read = 0 \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let updated: Vec<Message> = sqlx::query_as(&sql)
            .bind(recipient_id.to_string())
            .bind(sender_id.to_string())
            .fetch_all(&self.db_pool)
            .await?;

        for message in &updated {
            self.feed.publish(Operation::Update, Row::Message(message.clone()));
        }
        Ok(updated)
    }

    async fn count_unread(&self, recipient_id: Uuid) -> CoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE recipient_id = ? AND read = 0")
                .bind(recipient_id.to_string())
                .fetch_one(&self.db_pool)
                .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert_notification(&self, notification: &Notification) -> CoreResult<()> {
        let inserted = sqlx::query(
            "INSERT INTO notifications (id,user_id,kind,title,content,read,related_id,created_at) VALUES (?,?,?,?,?,?,?,?) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(notification.id.to_string())
        .bind(notification.user_id.to_string())
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.content)
        .bind(notification.read)
        .bind(notification.related_id.as_ref().map(Uuid::to_string))
        .bind(micros(notification.created_at))
        .execute(&self.db_pool)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            self.feed.publish(Operation::Insert, Row::Notification(notification.clone()));
        }
        Ok(())
    }

    async fn get_notification(&self, id: Uuid) -> CoreResult<Option<Notification>> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?");
        Ok(sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn mark_notification_read(&self, id: Uuid) -> CoreResult<Option<Notification>> {
        let sql = format!(
            "UPDATE notifications SET read = 1 WHERE id = ? AND read = 0 RETURNING {NOTIFICATION_COLUMNS}"
        );
        let updated: Option<Notification> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?;

        if let Some(notification) = &updated {
            self.feed.publish(Operation::Update, Row::Notification(notification.clone()));
        }
        Ok(updated)
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        let sql = format!(
            "UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0 RETURNING {NOTIFICATION_COLUMNS}"
        );
        let updated: Vec<Notification> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.db_pool)
            .await?;

        for notification in &updated {
            self.feed.publish(Operation::Update, Row::Notification(notification.clone()));
        }
        Ok(updated)
    }

    async fn delete_notification(&self, id: Uuid) -> CoreResult<Option<Notification>> {
        let sql = format!("DELETE FROM notifications WHERE id = ? RETURNING {NOTIFICATION_COLUMNS}");
        let deleted: Option<Notification> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?;

        if let Some(notification) = &deleted {
            self.feed.publish(Operation::Delete, Row::Notification(notification.clone()));
        }
        Ok(deleted)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> CoreResult<Vec<Notification>> {
        let unread = if unread_only { " AND read = 0" } else { "" };
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = ?{unread} \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(&self.db_pool)
            .await?)
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> CoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0")
                .bind(user_id.to_string())
                .fetch_one(&self.db_pool)
                .await?;
        Ok(count.max(0) as u64)
    }
}

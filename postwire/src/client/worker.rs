use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, oneshot},
};

use crate::{
    Result,
    common::debug,
    connection::{Connection, ConnectionClosed, State},
    encode::Param,
    row::Row,
};

pub(crate) type ReplySend<T> = oneshot::Sender<Result<T>>;

/// A submitted unit of work.
pub(crate) struct StatementRequest {
    pub(crate) sql: String,
    pub(crate) params: Vec<Param>,
    pub(crate) reply: ReplySend<Vec<Row>>,
}

pub(crate) enum WorkerMessage {
    Execute(StatementRequest),
    Close(ReplySend<()>),
}

/// Serve requests one at a time until every handle is dropped, the
/// connection is closed, or it fails.
pub(crate) async fn run<S>(mut conn: Connection<S>, mut recv: mpsc::Receiver<WorkerMessage>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = recv.recv().await {
        match message {
            WorkerMessage::Execute(req) => {
                // caller is gone before its turn
                if req.reply.is_closed() {
                    continue;
                }

                let result = conn.execute(&req.sql, &req.params).await;
                let _ = req.reply.send(result);

                if conn.state() == State::Failed {
                    debug!("worker stopped, connection failed");
                    reject_pending(&mut recv).await;
                    return;
                }
            },
            WorkerMessage::Close(reply) => {
                let result = conn.close().await;
                reject_pending(&mut recv).await;
                let _ = reply.send(result);
                return;
            },
        }
    }

    debug!("all client handles dropped");
    let _ = conn.close().await;
}

/// Refuse new requests and answer queued ones with [`ConnectionClosed`].
async fn reject_pending(recv: &mut mpsc::Receiver<WorkerMessage>) {
    recv.close();
    while let Some(message) = recv.recv().await {
        match message {
            WorkerMessage::Execute(req) => {
                let _ = req.reply.send(Err(ConnectionClosed.into()));
            },
            WorkerMessage::Close(reply) => {
                let _ = reply.send(Ok(()));
            },
        }
    }
}

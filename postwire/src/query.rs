//! Query API types.
use std::pin::Pin;

use crate::{
    Client, Result, Row,
    encode::{Encode, Param},
};

/// Statement builder, see [`Client::query`].
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Query<'c> {
    client: &'c Client,
    sql: String,
    params: Vec<Param>,
}

impl<'c> Query<'c> {
    pub(crate) fn new(client: &'c Client, sql: String) -> Self {
        Self { client, sql, params: Vec::new() }
    }

    /// Bind query parameter.
    ///
    /// Parameters bind by position in bind order. Binding a name again
    /// replaces the value and keeps its position.
    pub fn bind(mut self, name: impl Into<String>, value: impl Encode) -> Self {
        let param = Param::new(name, value);
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(p) => *p = param,
            None => self.params.push(param),
        }
        self
    }

    /// Bound parameters in position order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Execute statement and collect all returned rows.
    pub async fn execute(self) -> Result<Vec<Row>> {
        self.client.execute(self.sql, self.params).await
    }
}

impl<'c> IntoFuture for Query<'c> {
    type Output = Result<Vec<Row>>;

    type IntoFuture = Pin<Box<dyn Future<Output = Result<Vec<Row>>> + Send + 'c>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn rebind_keeps_position() {
        let (send, _recv) = mpsc::channel(1);
        let client = Client { send };
        let query = client
            .query("SELECT $1, $2")
            .bind("a", 1)
            .bind("b", "two")
            .bind("a", Some(3));

        let params = query.params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "a");
        assert_eq!(params[0].value, 3.encode());
        assert_eq!(params[1].value, "two".encode());
    }
}

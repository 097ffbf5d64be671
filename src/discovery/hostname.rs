//! Reverse DNS hostname lookup.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::Result;

/// Maximum DNS message size over UDP.
pub const MAX_UDP_DNS_SIZE: usize = 512;

/// Trait for hostname lookups. `None` when the address has no name.
pub trait HostnameLookup: Send + Sync {
    fn hostname(&self, ip: Ipv4Addr) -> impl Future<Output = Option<String>> + Send;
}

/// PTR lookups against a single DNS server over UDP.
#[derive(Debug, Clone)]
pub struct PtrResolver {
    server: SocketAddr,
    timeout: Duration,
}

impl PtrResolver {
    pub const fn new(server: SocketAddr, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    /// Send the PTR query for `ip` and return the first name of the answer.
    pub async fn lookup(&self, ip: Ipv4Addr) -> Result<Option<String>> {
        let query = ptr_query(ip, rand::random::<u16>())?;

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(self.server).await?;
        socket.send(&query.to_bytes()?).await?;

        let mut response_buf = [0u8; MAX_UDP_DNS_SIZE];
        let len = socket.recv(&mut response_buf).await?;

        let response = Message::from_bytes(&response_buf[..len])?;
        if response.id() != query.id() {
            debug!(%ip, "ignoring DNS answer with mismatched id");
            return Ok(None);
        }
        Ok(first_ptr_name(&response))
    }
}

impl HostnameLookup for PtrResolver {
    async fn hostname(&self, ip: Ipv4Addr) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.lookup(ip)).await {
            Ok(Ok(name)) => name,
            Ok(Err(err)) => {
                debug!(%ip, "reverse lookup failed: {err}");
                None
            }
            Err(_) => {
                debug!(%ip, "reverse lookup timed out");
                None
            }
        }
    }
}

/// The `in-addr.arpa` name of `ip`.
pub fn reverse_name(ip: Ipv4Addr) -> Result<Name> {
    let [a, b, c, d] = ip.octets();
    Ok(Name::from_ascii(format!("{d}.{c}.{b}.{a}.in-addr.arpa."))?)
}

fn ptr_query(ip: Ipv4Addr, id: u16) -> Result<Message> {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(Query::query(reverse_name(ip)?, RecordType::PTR));
    Ok(message)
}

fn first_ptr_name(response: &Message) -> Option<String> {
    response.answers().iter().find_map(|record| match record.data() {
        RData::PTR(ptr) => Some(ptr.0.to_utf8().trim_end_matches('.').to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::ResponseCode;
    use hickory_proto::rr::Record;
    use hickory_proto::rr::rdata::PTR;

    fn answer_for(query: &Message, name: &str) -> Message {
        let mut response = Message::new();
        response
            .set_id(query.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_response_code(ResponseCode::NoError);
        let owner = query.queries()[0].name().clone();
        response.add_answer(Record::from_rdata(
            owner,
            300,
            RData::PTR(PTR(Name::from_ascii(name).unwrap())),
        ));
        response
    }

    /// Serve exactly one DNS answer on a local UDP socket.
    async fn one_shot_server(name: &'static str) -> SocketAddr {
        answering_server(name, 0).await
    }

    /// Serve one answer whose id is shifted by `id_offset` from the query's.
    async fn answering_server(name: &'static str, id_offset: u16) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; MAX_UDP_DNS_SIZE];
            let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
            let query = Message::from_bytes(&buf[..len]).unwrap();
            let mut response = answer_for(&query, name);
            response.set_id(query.id().wrapping_add(id_offset));
            socket
                .send_to(&response.to_bytes().unwrap(), peer)
                .await
                .unwrap();
        });
        addr
    }

    #[test]
    fn should_build_reverse_name() {
        let name = reverse_name(Ipv4Addr::new(192, 168, 1, 10)).unwrap();
        assert_eq!(name.to_utf8(), "10.1.168.192.in-addr.arpa.");
    }

    #[test]
    fn should_build_ptr_query() {
        let query = ptr_query(Ipv4Addr::new(10, 0, 0, 1), 42).unwrap();
        assert_eq!(query.id(), 42);
        assert!(query.recursion_desired());
        assert_eq!(query.queries()[0].query_type(), RecordType::PTR);
    }

    #[test]
    fn should_extract_first_ptr_name() {
        let query = ptr_query(Ipv4Addr::new(10, 0, 0, 1), 7).unwrap();
        let response = answer_for(&query, "printer.lan.");
        assert_eq!(first_ptr_name(&response).as_deref(), Some("printer.lan"));
    }

    #[tokio::test]
    async fn should_resolve_hostname_from_server() {
        let server = one_shot_server("laptop.home.").await;
        let resolver = PtrResolver::new(server, Duration::from_secs(2));

        let name = resolver.hostname(Ipv4Addr::new(192, 168, 1, 10)).await;

        assert_eq!(name.as_deref(), Some("laptop.home"));
    }

    #[tokio::test]
    async fn should_ignore_answer_for_another_query_id() {
        let server = answering_server("laptop.home.", 1).await;
        let resolver = PtrResolver::new(server, Duration::from_secs(2));

        let name = resolver.lookup(Ipv4Addr::new(192, 168, 1, 10)).await.unwrap();

        assert!(name.is_none());
    }

    #[tokio::test]
    async fn should_return_none_when_server_is_silent() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let resolver = PtrResolver::new(silent.local_addr().unwrap(), Duration::from_millis(50));

        assert!(resolver.hostname(Ipv4Addr::new(192, 168, 1, 10)).await.is_none());
    }
}

// Working out the SMTP envelope for a submission. Anything not given on
// the command line is taken from the message headers or the local host.

use crate::api::Submit;
use mailparse::{addrparse_header, MailAddr, MailHeaderMap};
use std::net::{IpAddr, UdpSocket};
use tracing::debug;

/// Sender, recipient and connecting-host details for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    pub ip: String,
    pub helo: String,
}

impl Envelope {
    /// Fill `from` and `to` from the message headers when they are empty.
    /// `Return-Path` wins over `From` for the sender. Unparseable headers
    /// leave the fields as they are.
    pub fn fill_from_message(&mut self, raw: &[u8]) {
        if !self.from.is_empty() && !self.to.is_empty() {
            return;
        }
        let headers = match mailparse::parse_headers(raw) {
            Ok((headers, _)) => headers,
            Err(e) => {
                debug!("cannot parse message headers: {e}");
                return;
            }
        };
        if self.from.is_empty() {
            self.from = first_address(&headers, "Return-Path")
                .or_else(|| first_address(&headers, "From"))
                .unwrap_or_default();
        }
        if self.to.is_empty() {
            self.to = first_address(&headers, "To").unwrap_or_default();
        }
    }

    /// Fill `ip` and `helo` from the local machine when they are empty.
    pub fn fill_from_host(&mut self) {
        if self.ip.is_empty() {
            self.ip = outbound_ip().map(|ip| ip.to_string()).unwrap_or_default();
        }
        if self.helo.is_empty() {
            self.helo = gethostname::gethostname().to_string_lossy().into_owned();
        }
    }

    /// Build the request body for POST /emails.
    pub fn submission(&self, raw: &[u8], smtputf8: bool, staged: bool) -> Submit {
        Submit {
            from: self.from.clone(),
            to: self.to.clone(),
            ip: self.ip.clone(),
            payload: String::from_utf8_lossy(raw).into_owned(),
            smtputf8: Some(smtputf8),
            options: staged.then(|| "stage".to_string()),
            ..Default::default()
        }
    }
}

fn first_address(headers: &[mailparse::MailHeader], name: &str) -> Option<String> {
    let header = headers.get_first_header(name)?;
    let list = addrparse_header(header).ok()?;
    list.iter()
        .flat_map(|addr| match addr {
            MailAddr::Single(info) => vec![info.addr.clone()],
            MailAddr::Group(group) => group.addrs.iter().map(|i| i.addr.clone()).collect(),
        })
        .find(|addr| !addr.is_empty())
}

/// The local address the OS would route traffic to the internet from.
/// Connecting a UDP socket sends nothing.
fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

use std::error::Error;

use ldap3::LdapConnAsync;
use syncrepl_exporter::{LdapConfig, Metrics};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpListener,
};

pub fn docker_config() -> LdapConfig {
	LdapConfig {
		host: "localhost".to_owned(),
		port: "1636".to_owned(),
		basedn: "dc=example,dc=org".to_owned(),
		bind: true,
		bindcn: "cn=admin,dc=example,dc=org".to_owned(),
		bindpass: "adminpassword".to_owned(),
		insecure_skip_verify: true,
		..LdapConfig::default()
	}
}

/// Listen on a local port, answer the first request (a StartTLS extended
/// request) with an extended response carrying `result_code`, then write
/// `trailer` in plain text and close the connection. Returns the port.
pub async fn starttls_responder(result_code: u8, trailer: &'static [u8]) -> u16 {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	tokio::spawn(async move {
		let (mut stream, _) = listener.accept().await.unwrap();
		let mut request = vec![0; 256];
		let read = stream.read(&mut request).await.unwrap();
		// LDAPMessage ::= SEQUENCE { messageID INTEGER, ... } with a short
		// length form, so the message ID starts at offset 2.
		assert!(read > 4 && request[0] == 0x30 && request[2] == 0x02, "not an LDAP message");
		let message_id = &request[2..4 + usize::from(request[3])];

		let extended_response = [0x78, 0x07, 0x0a, 0x01, result_code, 0x04, 0x00, 0x04, 0x00];
		let mut response = vec![0x30];
		response.push(u8::try_from(message_id.len() + extended_response.len()).unwrap());
		response.extend_from_slice(message_id);
		response.extend_from_slice(&extended_response);
		stream.write_all(&response).await.unwrap();

		stream.write_all(trailer).await.unwrap();
		stream.shutdown().await.unwrap();
	});
	port
}

/// Value of a series in the rendered registry, e.g. `openldap_up`.
pub fn sample(metrics: &Metrics, series: &str) -> Option<f64> {
	metrics
		.render()
		.lines()
		.filter(|line| !line.starts_with('#'))
		.filter_map(|line| line.rsplit_once(' '))
		.find(|(name, _)| *name == series)
		.and_then(|(_, value)| value.parse().ok())
}

pub async fn ldap_add_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("ou={},dc=example,dc=org", ou),
		vec![("objectClass", ["organizationalUnit"].into())],
	)
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("ou={},dc=example,dc=org", ou)).await?.success()?;
	Ok(())
}

pub async fn ldap_connect() -> Result<ldap3::Ldap, Box<dyn Error>> {
	let (conn, mut ldap) = LdapConnAsync::new("ldap://localhost:1389").await?;
	let _handle = tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			panic!("Ldap connection error {err}");
		}
	});
	ldap.simple_bind("cn=admin,dc=example,dc=org", "adminpassword").await?;
	Ok(ldap)
}

pub async fn ldap_delete_user(ldap: &mut ldap3::Ldap, cn: &str) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("cn={},ou=users,dc=example,dc=org", cn)).await?.success()?;
	Ok(())
}

pub async fn ldap_add_user(
	ldap: &mut ldap3::Ldap,
	cn: &str,
	sn: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("cn={},ou=users,dc=example,dc=org", cn),
		vec![("objectClass", ["inetOrgPerson"].into()), ("sn", [sn].into())],
	)
	.await?
	.success()?;
	Ok(())
}

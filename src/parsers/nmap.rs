//! nmap XML report (`-oX -`)
//!
//! The report is trusted all-or-nothing: any malformed element fails the whole
//! parse instead of returning a partial port table.

use crate::error::ToolError;
use crate::models::{PortReport, PortResult, Protocol};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct NmapRun {
    #[serde(default)]
    host: Vec<XmlHost>,
}

#[derive(Debug, Deserialize)]
struct XmlHost {
    status: Option<XmlState>,
    ports: Option<XmlPorts>,
}

#[derive(Debug, Deserialize)]
struct XmlPorts {
    #[serde(default)]
    port: Vec<XmlPort>,
}

#[derive(Debug, Deserialize)]
struct XmlPort {
    #[serde(rename = "@protocol")]
    protocol: Option<String>,
    #[serde(rename = "@portid")]
    portid: String,
    state: Option<XmlState>,
    service: Option<XmlService>,
}

#[derive(Debug, Deserialize)]
struct XmlState {
    #[serde(rename = "@state")]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlService {
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@product")]
    product: Option<String>,
    #[serde(rename = "@version")]
    version: Option<String>,
}

const UNKNOWN: &str = "unknown";

fn parse_error(reason: impl ToString) -> ToolError {
    ToolError::OutputParse {
        tool: "nmap".to_string(),
        reason: reason.to_string(),
    }
}

/// Parse the first host of an nmap XML report
pub fn parse_nmap_xml(xml: &str) -> Result<PortReport, ToolError> {
    let run: NmapRun = quick_xml::de::from_str(xml).map_err(parse_error)?;

    let Some(host) = run.host.into_iter().next() else {
        return Ok(PortReport {
            host_state: UNKNOWN.to_string(),
            ports: Vec::new(),
        });
    };

    let host_state = host
        .status
        .and_then(|s| s.state)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let ports = host
        .ports
        .map(|p| p.port)
        .unwrap_or_default()
        .into_iter()
        .map(convert_port)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PortReport { host_state, ports })
}

fn convert_port(port: XmlPort) -> Result<PortResult, ToolError> {
    let number = port
        .portid
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|n| *n != 0)
        .ok_or_else(|| parse_error(format!("invalid portid '{}'", port.portid)))?;

    let protocol = match port.protocol.as_deref() {
        None | Some("tcp") => Protocol::Tcp,
        Some("udp") => Protocol::Udp,
        Some(other) => return Err(parse_error(format!("unsupported protocol '{}'", other))),
    };

    let state = port
        .state
        .and_then(|s| s.state)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let (service, product, version) = match port.service {
        Some(svc) => (
            Some(svc.name.unwrap_or_else(|| UNKNOWN.to_string())),
            Some(svc.product.unwrap_or_default()),
            Some(svc.version.unwrap_or_default()),
        ),
        None => (None, None, None),
    };

    Ok(PortResult {
        number,
        protocol,
        state,
        service,
        product,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<?xml-stylesheet href="file:///usr/bin/../share/nmap/nmap.xsl" type="text/xsl"?>
<!-- Nmap 7.94 scan initiated as: nmap -sS -p 21,80 -oX - 10.0.0.5 -->
<nmaprun scanner="nmap" args="nmap -sS -p 21,80 -oX - 10.0.0.5" start="1700000000" version="7.94" xmloutputversion="1.05">
<scaninfo type="syn" protocol="tcp" numservices="2" services="21,80"/>
<verbose level="0"/>
<debugging level="0"/>
<host starttime="1700000000" endtime="1700000001">
<status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="10.0.0.5" addrtype="ipv4"/>
<hostnames>
</hostnames>
<ports>
<port protocol="tcp" portid="21"><state state="open" reason="syn-ack" reason_ttl="64"/><service name="ftp" product="vsftpd" version="2.3.4" method="probed" conf="10"/></port>
<port protocol="tcp" portid="80"><state state="closed" reason="reset" reason_ttl="64"/></port>
</ports>
<times srtt="300" rttvar="5000" to="100000"/>
</host>
<runstats><finished time="1700000001" timestr="Tue Nov 14 22:13:21 2023" elapsed="0.50" summary="Nmap done" exit="success"/><hosts up="1" down="0" total="1"/>
</runstats>
</nmaprun>
"#;

    #[test]
    fn test_parse_report() {
        let report = parse_nmap_xml(REPORT).unwrap();
        assert_eq!(report.host_state, "up");
        assert_eq!(report.ports.len(), 2);

        let ftp = &report.ports[0];
        assert_eq!(ftp.number, 21);
        assert_eq!(ftp.protocol, Protocol::Tcp);
        assert_eq!(ftp.state, "open");
        assert_eq!(ftp.service.as_deref(), Some("ftp"));
        assert_eq!(ftp.product.as_deref(), Some("vsftpd"));
        assert_eq!(ftp.version.as_deref(), Some("2.3.4"));

        let http = &report.ports[1];
        assert_eq!(http.number, 80);
        assert_eq!(http.state, "closed");
        assert_eq!(http.service, None);

        assert_eq!(report.open_count(), 1);
        assert!(report.is_open(21));
    }

    #[test]
    fn test_service_defaults() {
        let xml = r#"<nmaprun><host><status state="up"/><ports>
<port portid="53" protocol="udp"><state state="open|filtered"/><service/></port>
<port portid="8080"><service name="http-proxy"/></port>
</ports></host></nmaprun>"#;
        let report = parse_nmap_xml(xml).unwrap();

        let dns = &report.ports[0];
        assert_eq!(dns.protocol, Protocol::Udp);
        assert_eq!(dns.state, "open|filtered");
        assert_eq!(dns.service.as_deref(), Some("unknown"));
        assert_eq!(dns.product.as_deref(), Some(""));
        assert_eq!(dns.version.as_deref(), Some(""));

        let proxy = &report.ports[1];
        assert_eq!(proxy.protocol, Protocol::Tcp);
        assert_eq!(proxy.state, "unknown");
        assert_eq!(report.open_count(), 0);
    }

    #[test]
    fn test_no_host_element() {
        let xml = r#"<nmaprun><runstats><hosts up="0" down="1" total="1"/></runstats></nmaprun>"#;
        let report = parse_nmap_xml(xml).unwrap();
        assert_eq!(report.host_state, "unknown");
        assert!(report.ports.is_empty());
    }

    #[test]
    fn test_truncated_document_is_error() {
        let err = parse_nmap_xml("<nmaprun><host><ports>").unwrap_err();
        assert!(matches!(err, ToolError::OutputParse { .. }));
    }

    #[test]
    fn test_non_xml_is_error() {
        assert!(parse_nmap_xml("Starting Nmap 7.94 ( https://nmap.org )").is_err());
        assert!(parse_nmap_xml("").is_err());
    }

    #[test]
    fn test_bad_port_number_fails_whole_report() {
        let xml = r#"<nmaprun><host><ports>
<port portid="21"><state state="open"/></port>
<port portid="http"><state state="open"/></port>
</ports></host></nmaprun>"#;
        let err = parse_nmap_xml(xml).unwrap_err();
        assert!(err.to_string().contains("invalid portid"));
    }

    #[test]
    fn test_port_zero_fails_whole_report() {
        let xml = r#"<nmaprun><host><status state="up"/><ports>
<port protocol="tcp" portid="0"><state state="open"/></port>
</ports></host></nmaprun>"#;
        let err = parse_nmap_xml(xml).unwrap_err();
        assert_eq!(err.kind(), "output_parse");
        assert!(err.to_string().contains("invalid portid '0'"));
    }
}

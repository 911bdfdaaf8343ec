//! ClientPayload construction for the ClientFinish message.
//!
//! Two modes, chosen by whether the device has paired before: registration
//! (`passive = false`, companion reg data embedded) and resume
//! (`passive = true`, username/device from the stored JID).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use prost::Message;

use crate::auth::AuthState;
use crate::binary::encode_uint;
use crate::constants::{BUILD_HASH, DEFAULT_BROWSER, DJB_KEY_TYPE, WHATSAPP_WEB_VERSION};
use crate::proto::{AppVersion, ClientPayload, CompanionProps, CompanionRegData, UserAgent, WebInfo};

/// Build the login payload for the current auth state.
pub fn build_client_payload(auth: &AuthState) -> ClientPayload {
    let mut payload = ClientPayload {
        connect_type: Some(1),
        connect_reason: Some(1),
        user_agent: Some(build_user_agent()),
        web_info: Some(WebInfo {
            web_sub_platform: Some(0),
        }),
        ..Default::default()
    };

    match &auth.me {
        None => {
            payload.passive = Some(false);
            payload.reg_data = Some(build_reg_data(auth));
        }
        Some(me) => {
            payload.passive = Some(true);
            let (user, _agent, device, _server) = me.jid.split();
            payload.username = user.parse().ok();
            payload.device = Some(u32::from(device));
        }
    }

    payload
}

fn build_user_agent() -> UserAgent {
    let (primary, secondary, tertiary) = WHATSAPP_WEB_VERSION;
    let (_os, device, os_version) = DEFAULT_BROWSER;

    UserAgent {
        platform: Some(14),
        app_version: Some(AppVersion {
            primary: Some(primary),
            secondary: Some(secondary),
            tertiary: Some(tertiary),
        }),
        mcc: Some("000".into()),
        mnc: Some("000".into()),
        os_version: Some(os_version.into()),
        manufacturer: Some(String::new()),
        device: Some(device.into()),
        os_build_number: Some("0.1".into()),
        release_channel: Some(0),
        locale_language_iso_639_1: Some("en".into()),
        locale_country_iso_3166_1_alpha_2: Some("en".into()),
    }
}

fn build_reg_data(auth: &AuthState) -> CompanionRegData {
    let props = CompanionProps {
        os: Some(DEFAULT_BROWSER.0.into()),
        version: Some(AppVersion {
            primary: Some(10),
            secondary: None,
            tertiary: None,
        }),
        platform_type: Some(1),
        require_full_sync: Some(false),
    };

    CompanionRegData {
        e_regid: Some(auth.registration_id.to_be_bytes().to_vec()),
        e_keytype: Some(vec![DJB_KEY_TYPE]),
        e_ident: Some(auth.identity_key.public.to_vec()),
        e_skey_id: Some(encode_uint(u64::from(auth.signed_prekey.id), 3)),
        e_skey_val: Some(auth.signed_prekey.key_pair.public.to_vec()),
        e_skey_sig: Some(auth.signed_prekey.signature.to_vec()),
        build_hash: Some(
            BASE64
                .decode(BUILD_HASH)
                .expect("build hash constant is valid base64"),
        ),
        companion_props: Some(props.encode_to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthState, Me};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn fresh_auth() -> AuthState {
        AuthState::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn pairing_mode_embeds_registration_data() {
        let auth = fresh_auth();
        let payload = build_client_payload(&auth);

        assert_eq!(payload.passive, Some(false));
        assert_eq!(payload.username, None);
        assert_eq!(payload.connect_reason, Some(1));
        assert_eq!(payload.connect_type, Some(1));

        let reg = payload.reg_data.expect("registration data present");
        assert_eq!(
            reg.e_regid.as_deref(),
            Some(&auth.registration_id.to_be_bytes()[..])
        );
        assert_eq!(reg.e_keytype.as_deref(), Some(&[5u8][..]));
        assert_eq!(reg.e_ident.as_deref(), Some(&auth.identity_key.public[..]));
        assert_eq!(reg.e_skey_id.as_deref().map(<[u8]>::len), Some(3));
        assert_eq!(
            reg.e_skey_val.as_deref(),
            Some(&auth.signed_prekey.key_pair.public[..])
        );
        assert_eq!(
            reg.e_skey_sig.as_deref(),
            Some(&auth.signed_prekey.signature[..])
        );
        assert_eq!(reg.build_hash.as_deref().map(<[u8]>::len), Some(16));

        let props =
            CompanionProps::decode(reg.companion_props.as_deref().unwrap_or_default()).unwrap();
        assert_eq!(props.os.as_deref(), Some(DEFAULT_BROWSER.0));
        assert_eq!(props.platform_type, Some(1));
        assert_eq!(props.require_full_sync, Some(false));
        assert_eq!(props.version.unwrap().primary, Some(10));
    }

    #[test]
    fn resume_mode_splits_the_stored_jid() {
        let mut auth = fresh_auth();
        auth.me = Some(Me {
            jid: "5521987654321:2@s.whatsapp.net".parse().unwrap(),
        });

        let payload = build_client_payload(&auth);

        assert_eq!(payload.passive, Some(true));
        assert_eq!(payload.reg_data, None);
        assert_eq!(payload.username, Some(5_521_987_654_321));
        assert_eq!(payload.device, Some(2));
    }

    #[test]
    fn both_modes_share_the_user_agent() {
        let auth = fresh_auth();
        let payload = build_client_payload(&auth);
        let agent = payload.user_agent.expect("user agent present");

        assert_eq!(agent.platform, Some(14));
        assert_eq!(agent.mcc.as_deref(), Some("000"));
        assert_eq!(agent.mnc.as_deref(), Some("000"));
        assert_eq!(agent.os_build_number.as_deref(), Some("0.1"));
        assert_eq!(agent.locale_language_iso_639_1.as_deref(), Some("en"));

        let version = agent.app_version.unwrap();
        assert_eq!(
            (version.primary, version.secondary, version.tertiary),
            (Some(2), Some(2142), Some(12))
        );
        assert_eq!(payload.web_info.unwrap().web_sub_platform, Some(0));
    }
}

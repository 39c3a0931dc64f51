//! GATT Service Registry
//!
//! Static description of the Enroll and Auth services exposed by the
//! peripheral. Each service carries a write-only input characteristic and a
//! read-only output characteristic.

use crate::domain::models::ServiceKind;
use uuid::Uuid;

/// Enroll service UUID
pub const ENROLL_SERVICE_UUID: Uuid = Uuid::from_u128(0x80cbfcd9_c13a_4817_8921_349f3702a4d0);
/// Enroll input characteristic (central writes requests here)
pub const ENROLL_INPUT_CHAR_UUID: Uuid = Uuid::from_u128(0x40a70aad_6e05_4ebd_b9db_2010dc412881);
/// Enroll output characteristic (central reads responses here)
pub const ENROLL_OUTPUT_CHAR_UUID: Uuid = Uuid::from_u128(0xac103510_5e49_41c5_94da_cba4329a6cf5);

/// Auth service UUID
pub const AUTH_SERVICE_UUID: Uuid = Uuid::from_u128(0x1012a197_b767_421c_b49c_10f385ba22e1);
/// Auth input characteristic
pub const AUTH_INPUT_CHAR_UUID: Uuid = Uuid::from_u128(0xe11c666d_a68c_4775_a05e_2765830d5d60);
/// Auth output characteristic
pub const AUTH_OUTPUT_CHAR_UUID: Uuid = Uuid::from_u128(0xbedfa15a_9048_4abd_8455_6e164f4878e3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicProperty {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePermission {
    Readable,
    Writeable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicDescriptor {
    pub uuid: Uuid,
    pub property: CharacteristicProperty,
    pub permission: AttributePermission,
}

/// Immutable description of one primary GATT service
#[derive(Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub kind: ServiceKind,
    pub uuid: Uuid,
    pub input_characteristic: Uuid,
    pub output_characteristic: Uuid,
    pub name: &'static str,
    /// Log names of the service, input and output attributes
    pub attribute_names: [&'static str; 3],
}

impl ServiceDescriptor {
    /// Input (write) and output (read) characteristics, in that order
    /// Log name of this service or one of its characteristics
    pub fn attribute_name(&self, uuid: &Uuid) -> Option<&'static str> {
        [self.uuid, self.input_characteristic, self.output_characteristic]
            .iter()
            .position(|known| known == uuid)
            .map(|index| self.attribute_names[index])
    }

    pub fn characteristics(&self) -> [CharacteristicDescriptor; 2] {
        [
            CharacteristicDescriptor {
                uuid: self.input_characteristic,
                property: CharacteristicProperty::Write,
                permission: AttributePermission::Writeable,
            },
            CharacteristicDescriptor {
                uuid: self.output_characteristic,
                property: CharacteristicProperty::Read,
                permission: AttributePermission::Readable,
            },
        ]
    }
}

pub static ENROLL: ServiceDescriptor = ServiceDescriptor {
    kind: ServiceKind::Enroll,
    uuid: ENROLL_SERVICE_UUID,
    input_characteristic: ENROLL_INPUT_CHAR_UUID,
    output_characteristic: ENROLL_OUTPUT_CHAR_UUID,
    name: "Enroll",
    attribute_names: ["enrollService", "enrollInput", "enrollOutput"],
};

pub static AUTH: ServiceDescriptor = ServiceDescriptor {
    kind: ServiceKind::Auth,
    uuid: AUTH_SERVICE_UUID,
    input_characteristic: AUTH_INPUT_CHAR_UUID,
    output_characteristic: AUTH_OUTPUT_CHAR_UUID,
    name: "Auth",
    attribute_names: ["authService", "authInput", "authOutput"],
};

pub fn descriptor(kind: ServiceKind) -> &'static ServiceDescriptor {
    match kind {
        ServiceKind::Enroll => &ENROLL,
        ServiceKind::Auth => &AUTH,
    }
}

/// Find the service kind for a service UUID
pub fn kind_of(service_uuid: &Uuid) -> Option<ServiceKind> {
    ServiceKind::ALL
        .into_iter()
        .find(|kind| descriptor(*kind).uuid == *service_uuid)
}

/// Display name for any known service or characteristic UUID
pub fn name_for(uuid: &Uuid) -> &'static str {
    ServiceKind::ALL
        .into_iter()
        .find_map(|kind| descriptor(kind).attribute_name(uuid))
        .unwrap_or("unknown")
}
